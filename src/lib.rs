pub mod calibration;
pub mod config;
pub mod diagnostic;
pub mod messages;
pub mod motor;
pub mod prompt;
pub mod runtime;
