// Operator prompts: ask a human to position a motor and wait for the go-ahead
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("cancelled by operator")]
    Cancelled,

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

/// Blocks until the operator acknowledges `prompt`.
///
/// This is the only point where a diagnostic run waits on anything other
/// than the bus. There is no timeout; `PromptError::Cancelled` ends the run.
pub trait OperatorPrompt {
    fn await_operator_ready(&mut self, prompt: &str) -> Result<(), PromptError>;
}

impl<T: OperatorPrompt + ?Sized> OperatorPrompt for &mut T {
    fn await_operator_ready(&mut self, prompt: &str) -> Result<(), PromptError> {
        (**self).await_operator_ready(prompt)
    }
}

/// Restores cooked mode even when the wait errors out
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Keyboard prompt on the controlling terminal, written to stderr so
/// stdout only carries the report.
/// Enter acknowledges; Esc, `q` and Ctrl+C cancel.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }

    /// Next key press. Ctrl+C does not raise SIGINT in raw mode, so it is
    /// turned into a cancellation here.
    fn next_key(&mut self) -> Result<KeyCode, PromptError> {
        let _raw = RawMode::enable()?;
        loop {
            if let Event::Key(KeyEvent {
                code,
                kind,
                modifiers,
                ..
            }) = event::read()?
            {
                if kind != KeyEventKind::Press {
                    continue;
                }
                if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
                    return Err(PromptError::Cancelled);
                }
                return Ok(code);
            }
        }
    }

    /// Yes/no question, anything but `y` means no
    pub fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        eprint!("{} [y/N]: ", question);
        io::stderr().flush()?;
        let answer = match self.next_key()? {
            KeyCode::Char('y') | KeyCode::Char('Y') => true,
            KeyCode::Esc => return Err(PromptError::Cancelled),
            _ => false,
        };
        eprintln!("{}", if answer { "y" } else { "n" });
        Ok(answer)
    }
}

impl OperatorPrompt for TerminalPrompt {
    fn await_operator_ready(&mut self, prompt: &str) -> Result<(), PromptError> {
        eprintln!();
        eprint!("{} [Enter = ready, Esc = abort] ", prompt);
        io::stderr().flush()?;
        loop {
            match self.next_key()? {
                KeyCode::Enter => break,
                KeyCode::Esc | KeyCode::Char('q') => {
                    eprintln!();
                    return Err(PromptError::Cancelled);
                }
                _ => {}
            }
        }
        eprintln!();
        Ok(())
    }
}
