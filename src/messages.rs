// Report messages published by the calibration tool

use serde::{Deserialize, Serialize};

use crate::diagnostic::{BusDiagnosticReport, DiagnosticResult, SpanClass};

// One tested motor, as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorReport {
    pub motor: String,
    pub healthy: bool,
    pub readable: bool,
    pub zero: Option<i32>,
    pub max: Option<i32>,
    pub span: i64,
    pub classification: Option<SpanClass>,
    /// Normalized percent of each probe sample
    pub probes: Vec<f64>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl From<&DiagnosticResult> for MotorReport {
    fn from(result: &DiagnosticResult) -> Self {
        Self {
            motor: result.motor_name().to_string(),
            healthy: result.healthy(),
            readable: result.position_readable(),
            zero: result.zero_position(),
            max: result.max_position(),
            span: result.span(),
            classification: result.classification(),
            probes: result.probes().iter().map(|p| p.percent).collect(),
            warnings: result.warnings().to_vec(),
            errors: result.errors().to_vec(),
        }
    }
}

/// Whole bus run, motors in test order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationReport {
    pub motors: Vec<MotorReport>,
    pub all_healthy: bool,
}

impl From<&BusDiagnosticReport> for CalibrationReport {
    fn from(report: &BusDiagnosticReport) -> Self {
        Self {
            motors: report.iter().map(MotorReport::from).collect(),
            all_healthy: report.all_healthy(),
        }
    }
}
