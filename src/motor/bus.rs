// Named-register access to the motors on one bus
//
// The diagnostic engine only sees `RegisterBus`; `FeetechMotorsBus` maps
// motor names to bus IDs and register names to the STS3215 control table.

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::debug;

use super::feetech::{
    self, Access, Encoding, FeetechBus, FeetechError, Register, decode_sign_magnitude,
    encode_sign_magnitude,
};

/// A motor on the bus: unique name, bus ID and model tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motor {
    pub name: String,
    pub id: u8,
    pub model: String,
}

impl Motor {
    pub fn new(name: impl Into<String>, id: u8, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            model: model.into(),
        }
    }
}

/// Typed register content, produced by reads and consumed by writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Int(i32),
    Bool(bool),
}

impl RegisterValue {
    pub fn as_int(self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(v),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Int(0) => Some(false),
            Self::Int(1) => Some(true),
            Self::Int(_) => None,
        }
    }
}

impl From<i32> for RegisterValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for RegisterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Failure of a single register read or write
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error("unknown motor '{0}'")]
    UnknownMotor(String),

    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    #[error("register '{0}' is read-only")]
    ReadOnly(String),

    #[error("value {value:?} does not fit register '{register}'")]
    InvalidValue {
        register: String,
        value: RegisterValue,
    },

    #[error("motor '{motor}' did not respond")]
    NoResponse { motor: String },

    #[error("bus failure on motor '{motor}': {source}")]
    Transport {
        motor: String,
        #[source]
        source: FeetechError,
    },

    #[error("malformed response from motor '{motor}': {reason}")]
    Malformed { motor: String, reason: String },
}

/// Contract the diagnostic engine consumes
///
/// Implementations never retry: a failed read or write is reported once.
pub trait RegisterBus {
    fn read(&mut self, register: &str, motor: &str) -> Result<RegisterValue, CommunicationError>;

    fn write(
        &mut self,
        register: &str,
        motor: &str,
        value: RegisterValue,
    ) -> Result<(), CommunicationError>;

    /// Motor table, fixed for the lifetime of the bus
    fn motors(&self) -> &[Motor];

    fn list_motor_names(&self) -> Vec<String> {
        self.motors().iter().map(|m| m.name.clone()).collect()
    }

    fn motor(&self, name: &str) -> Option<&Motor> {
        self.motors().iter().find(|m| m.name == name)
    }
}

/// Rejected motor table
#[derive(Debug, thiserror::Error)]
pub enum MotorTableError {
    #[error("motor table is empty")]
    Empty,

    #[error("duplicate motor name '{0}'")]
    DuplicateName(String),

    #[error("motors '{first}' and '{second}' share bus ID {id}")]
    DuplicateId { id: u8, first: String, second: String },
}

/// Check that names and IDs are unique
pub fn validate_motor_table(motors: &[Motor]) -> Result<(), MotorTableError> {
    if motors.is_empty() {
        return Err(MotorTableError::Empty);
    }
    let mut names = HashSet::new();
    for (i, motor) in motors.iter().enumerate() {
        if !names.insert(motor.name.as_str()) {
            return Err(MotorTableError::DuplicateName(motor.name.clone()));
        }
        if let Some(other) = motors[..i].iter().find(|m| m.id == motor.id) {
            return Err(MotorTableError::DuplicateId {
                id: motor.id,
                first: other.name.clone(),
                second: motor.name.clone(),
            });
        }
    }
    Ok(())
}

/// Register bus over a Feetech STS/SCS serial line
pub struct FeetechMotorsBus<P = Box<dyn SerialPort>> {
    bus: FeetechBus<P>,
    motors: Vec<Motor>,
}

impl<P: Read + Write> FeetechMotorsBus<P> {
    pub fn new(bus: FeetechBus<P>, motors: Vec<Motor>) -> Result<Self, MotorTableError> {
        validate_motor_table(&motors)?;
        Ok(Self { bus, motors })
    }

    fn resolve(
        &self,
        register: &str,
        motor: &str,
    ) -> Result<(u8, &'static Register), CommunicationError> {
        let id = self
            .motor(motor)
            .map(|m| m.id)
            .ok_or_else(|| CommunicationError::UnknownMotor(motor.to_string()))?;
        let reg = feetech::register(register)
            .ok_or_else(|| CommunicationError::UnknownRegister(register.to_string()))?;
        Ok((id, reg))
    }

    pub fn into_inner(self) -> FeetechBus<P> {
        self.bus
    }
}

fn transport_error(motor: &str, e: FeetechError) -> CommunicationError {
    match e {
        FeetechError::Timeout { .. } => CommunicationError::NoResponse {
            motor: motor.to_string(),
        },
        source => CommunicationError::Transport {
            motor: motor.to_string(),
            source,
        },
    }
}

fn decode(reg: &Register, raw: u16) -> RegisterValue {
    match reg.encoding {
        Encoding::Unsigned => RegisterValue::Int(raw as i32),
        Encoding::Bool => RegisterValue::Bool(raw != 0),
        Encoding::SignMagnitude { sign_bit } => {
            RegisterValue::Int(decode_sign_magnitude(raw, sign_bit))
        }
    }
}

fn encode(reg: &Register, value: RegisterValue) -> Option<u16> {
    let max = if reg.width == 1 { 0xFF } else { 0xFFFF };
    match (reg.encoding, value) {
        (Encoding::Bool, v) => v.as_bool().map(u16::from),
        (Encoding::Unsigned, RegisterValue::Int(v)) if (0..=max).contains(&v) => Some(v as u16),
        (Encoding::SignMagnitude { sign_bit }, RegisterValue::Int(v)) => {
            encode_sign_magnitude(v, sign_bit)
        }
        _ => None,
    }
}

impl<P: Read + Write> RegisterBus for FeetechMotorsBus<P> {
    fn read(&mut self, register: &str, motor: &str) -> Result<RegisterValue, CommunicationError> {
        let (id, reg) = self.resolve(register, motor)?;
        let raw = self
            .bus
            .read_raw(id, reg)
            .map_err(|e| transport_error(motor, e))?;
        let value = decode(reg, raw);
        debug!("{}.{} = {:?}", motor, register, value);
        Ok(value)
    }

    fn write(
        &mut self,
        register: &str,
        motor: &str,
        value: RegisterValue,
    ) -> Result<(), CommunicationError> {
        let (id, reg) = self.resolve(register, motor)?;
        if reg.access == Access::ReadOnly {
            return Err(CommunicationError::ReadOnly(register.to_string()));
        }
        let raw = encode(reg, value).ok_or_else(|| CommunicationError::InvalidValue {
            register: register.to_string(),
            value,
        })?;
        self.bus
            .write_raw(id, reg, raw)
            .map_err(|e| transport_error(motor, e))
    }

    fn motors(&self) -> &[Motor] {
        &self.motors
    }
}
