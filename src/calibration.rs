//! Calibration commit: turn a passing diagnostic report into persisted
//! per-motor calibration.
//!
//! Each motor stores its zero and max raw positions. Positions are mapped to
//! percent of travel with `(raw - zero) / (max - zero) * 100`; a motor whose
//! max is below its zero is marked `inverted`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::diagnostic::{BusDiagnosticReport, normalize};
use crate::motor::Motor;

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("refusing to commit, unhealthy motors: {}", .0.join(", "))]
    Unhealthy(Vec<String>),

    #[error("report contains no motors")]
    NothingToCommit,

    #[error("motor '{0}' has no zero/max sample")]
    MissingEndpoints(String),

    #[error("motor '{0}' is not on the bus")]
    UnknownMotor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad calibration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Calibration for a single motor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorCalibration {
    pub name: String,
    pub id: u8,
    pub model: String,
    pub zero: i32,
    pub max: i32,
    pub range_min: i32,
    pub range_max: i32,
    pub span: i64,
    pub inverted: bool,
}

impl MotorCalibration {
    fn new(motor: &Motor, zero: i32, max: i32) -> Self {
        Self {
            name: motor.name.clone(),
            id: motor.id,
            model: motor.model.clone(),
            zero,
            max,
            range_min: zero.min(max),
            range_max: zero.max(max),
            span: i64::from(max) - i64::from(zero),
            inverted: max < zero,
        }
    }

    /// Percent of travel for a raw position, unclamped
    pub fn percent(&self, raw: i32) -> Option<f64> {
        normalize(raw, self.zero, self.span)
    }
}

/// Calibration data for all motors on a bus
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CalibrationData {
    pub motors: Vec<MotorCalibration>,
}

impl CalibrationData {
    /// Only an all-healthy report with both endpoints per motor is accepted
    pub fn from_report(report: &BusDiagnosticReport, motors: &[Motor]) -> Result<Self, CommitError> {
        if report.is_empty() {
            return Err(CommitError::NothingToCommit);
        }
        if !report.all_healthy() {
            let failed = report
                .iter()
                .filter(|r| !r.healthy())
                .map(|r| r.motor_name().to_string())
                .collect();
            return Err(CommitError::Unhealthy(failed));
        }

        let motors = report
            .iter()
            .map(|result| {
                let name = result.motor_name();
                let motor = motors
                    .iter()
                    .find(|m| m.name == name)
                    .ok_or_else(|| CommitError::UnknownMotor(name.to_string()))?;
                match (result.zero_position(), result.max_position()) {
                    (Some(zero), Some(max)) => Ok(MotorCalibration::new(motor, zero, max)),
                    _ => Err(CommitError::MissingEndpoints(name.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { motors })
    }

    pub fn get(&self, name: &str) -> Option<&MotorCalibration> {
        self.motors.iter().find(|m| m.name == name)
    }

    pub fn load(path: &Path) -> Result<Self, CommitError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CommitError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Build calibration from `report` and write it to `path`
pub fn commit_calibration(
    report: &BusDiagnosticReport,
    motors: &[Motor],
    path: &Path,
) -> Result<CalibrationData, CommitError> {
    let data = CalibrationData::from_report(report, motors)?;
    data.save(path)?;
    info!("Saved calibration for {} motors to {}", data.motors.len(), path.display());
    for m in &data.motors {
        info!(
            "  {:<16} id={:>2}  zero={:>4}  max={:>4}  span={:>5}{}",
            m.name,
            m.id,
            m.zero,
            m.max,
            m.span,
            if m.inverted { "  (inverted)" } else { "" }
        );
    }
    Ok(data)
}
