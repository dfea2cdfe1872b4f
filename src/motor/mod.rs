// Motor access for the SO-100 arm
//
// Provides:
// - Feetech STS3215 serial protocol implementation
// - Named-register bus contract used by the diagnostics

mod bus;
pub mod feetech;
#[cfg(test)]
pub(crate) mod testing;

pub use bus::{
    CommunicationError, FeetechMotorsBus, Motor, MotorTableError, RegisterBus, RegisterValue,
    validate_motor_table,
};
pub use feetech::{FeetechBus, FeetechError};
