// Range calibration: span between two sampled extremes and its normalization
//
// percent = (probe - zero) / span * 100, with span = max - zero (signed).
// A zero span would divide by zero, so it is classified instead of used.

use serde::{Deserialize, Serialize};

/// What a sample was taken for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRole {
    Zero,
    Max,
    Probe,
}

/// One raw position observation of one motor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationSample {
    pub motor_name: String,
    pub raw_position: i32,
    pub role: SampleRole,
}

impl CalibrationSample {
    pub fn new(motor_name: impl Into<String>, raw_position: i32, role: SampleRole) -> Self {
        Self {
            motor_name: motor_name.into(),
            raw_position,
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanClass {
    /// Zero span, normalization is undefined
    Degenerate,
    /// Nonzero but below the narrow threshold
    Narrow,
    Healthy,
}

impl SpanClass {
    pub fn classify(span: i64, narrow_threshold: u32) -> Self {
        let magnitude = span.unsigned_abs();
        if magnitude == 0 {
            Self::Degenerate
        } else if magnitude < u64::from(narrow_threshold) {
            Self::Narrow
        } else {
            Self::Healthy
        }
    }
}

/// Normalized percent of `probe` on the range starting at `zero`.
/// `None` for a zero span; the result is not clamped.
pub fn normalize(probe: i32, zero: i32, span: i64) -> Option<f64> {
    if span == 0 {
        return None;
    }
    let offset = i64::from(probe) - i64::from(zero);
    Some(offset as f64 / span as f64 * 100.0)
}

/// Inclusive check against a `(low, high)` percent band
pub fn within_band(percent: f64, band: (f64, f64)) -> bool {
    percent >= band.0 && percent <= band.1
}

/// Span of one motor between its zero and max samples
///
/// Built once both endpoints are known and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeResult {
    motor_name: String,
    zero_position: i32,
    max_position: i32,
    span: i64,
    classification: SpanClass,
}

impl RangeResult {
    pub fn motor_name(&self) -> &str {
        &self.motor_name
    }

    pub fn zero_position(&self) -> i32 {
        self.zero_position
    }

    pub fn max_position(&self) -> i32 {
        self.max_position
    }

    pub fn span(&self) -> i64 {
        self.span
    }

    pub fn classification(&self) -> SpanClass {
        self.classification
    }

    pub fn normalize(&self, probe: i32) -> Option<f64> {
        normalize(probe, self.zero_position, self.span)
    }
}

/// Pure range computation with a configurable narrow threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCalibrator {
    pub narrow_threshold: u32,
}

impl Default for RangeCalibrator {
    fn default() -> Self {
        Self::new(crate::config::NARROW_THRESHOLD)
    }
}

impl RangeCalibrator {
    pub fn new(narrow_threshold: u32) -> Self {
        Self { narrow_threshold }
    }

    pub fn calibrate(&self, motor_name: &str, zero_position: i32, second_position: i32) -> RangeResult {
        let span = i64::from(second_position) - i64::from(zero_position);
        RangeResult {
            motor_name: motor_name.to_string(),
            zero_position,
            max_position: second_position,
            span,
            classification: SpanClass::classify(span, self.narrow_threshold),
        }
    }

    pub fn calibrate_samples(&self, zero: &CalibrationSample, max: &CalibrationSample) -> RangeResult {
        debug_assert_eq!(zero.role, SampleRole::Zero);
        debug_assert_eq!(max.role, SampleRole::Max);
        debug_assert_eq!(zero.motor_name, max.motor_name);
        self.calibrate(&zero.motor_name, zero.raw_position, max.raw_position)
    }
}
