// Calibration diagnostics
//
// Bus diagnostic drives one motor diagnostic per motor, which drives the
// range calibrator. Everything reads through `RegisterBus`.

mod bus;
mod motor;
pub mod range;
#[cfg(test)]
pub(crate) mod testing;

pub use bus::{BusDiagnosticReport, RunAborted, diagnose_bus};
pub use motor::{DiagnosticOptions, DiagnosticResult, ProbeReading, diagnose_motor};
pub use range::{CalibrationSample, RangeCalibrator, RangeResult, SampleRole, SpanClass, normalize};
