// Scripted collaborators for diagnostic tests

use std::collections::{HashMap, VecDeque};

use crate::motor::{CommunicationError, Motor, RegisterBus, RegisterValue};
use crate::prompt::{OperatorPrompt, PromptError};

/// Register bus that answers `Present_Position` reads from per-motor queues.
/// An exhausted queue behaves like a motor that stopped answering.
pub struct ScriptedBus {
    motors: Vec<Motor>,
    reads: HashMap<String, VecDeque<Result<RegisterValue, ()>>>,
    pub writes: Vec<(String, String, RegisterValue)>,
}

impl ScriptedBus {
    pub fn new(names: &[&str]) -> Self {
        let motors = names
            .iter()
            .enumerate()
            .map(|(i, name)| Motor::new(*name, i as u8 + 1, "sts3215"))
            .collect();
        Self {
            motors,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    pub fn push(&mut self, motor: &str, outcome: Result<RegisterValue, ()>) {
        self.reads.entry(motor.to_string()).or_default().push_back(outcome);
    }

    pub fn positions(&mut self, motor: &str, positions: &[i32]) {
        for &p in positions {
            self.push(motor, Ok(RegisterValue::Int(p)));
        }
    }

    pub fn push_failure(&mut self, motor: &str) {
        self.push(motor, Err(()));
    }
}

impl RegisterBus for ScriptedBus {
    fn read(&mut self, _register: &str, motor: &str) -> Result<RegisterValue, CommunicationError> {
        if self.motor(motor).is_none() {
            return Err(CommunicationError::UnknownMotor(motor.to_string()));
        }
        self.reads
            .get_mut(motor)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(()))
            .map_err(|()| CommunicationError::NoResponse {
                motor: motor.to_string(),
            })
    }

    fn write(
        &mut self,
        register: &str,
        motor: &str,
        value: RegisterValue,
    ) -> Result<(), CommunicationError> {
        self.writes
            .push((register.to_string(), motor.to_string(), value));
        Ok(())
    }

    fn motors(&self) -> &[Motor] {
        &self.motors
    }
}

/// Acknowledges every prompt immediately, optionally cancelling one
#[derive(Default)]
pub struct ScriptedPrompt {
    pub prompts: Vec<String>,
    cancel_at: Option<usize>,
}

impl ScriptedPrompt {
    /// Cancel on the call with this zero-based index
    pub fn cancel_at(index: usize) -> Self {
        Self {
            prompts: Vec::new(),
            cancel_at: Some(index),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn await_operator_ready(&mut self, prompt: &str) -> Result<(), PromptError> {
        let index = self.prompts.len();
        self.prompts.push(prompt.to_string());
        if self.cancel_at == Some(index) {
            return Err(PromptError::Cancelled);
        }
        Ok(())
    }
}
