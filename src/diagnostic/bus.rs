// Bus-wide diagnostic: one independent motor diagnostic per motor, then a summary

use std::collections::HashSet;
use std::fmt;
use tracing::{error, info, warn};

use super::motor::{DiagnosticOptions, DiagnosticResult, diagnose_motor};
use crate::motor::RegisterBus;
use crate::prompt::{OperatorPrompt, PromptError};

/// Results of one bus run, in the order the motors were tested
#[derive(Debug, Clone, PartialEq)]
pub struct BusDiagnosticReport {
    results: Vec<DiagnosticResult>,
}

impl BusDiagnosticReport {
    pub(crate) fn new(results: Vec<DiagnosticResult>) -> Self {
        Self { results }
    }

    /// True when every tested motor is healthy
    pub fn all_healthy(&self) -> bool {
        self.results.iter().all(DiagnosticResult::healthy)
    }

    pub fn get(&self, motor_name: &str) -> Option<&DiagnosticResult> {
        self.results.iter().find(|r| r.motor_name() == motor_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.results.iter()
    }

    pub fn motor_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(DiagnosticResult::motor_name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Emit the summary through tracing
    pub fn log_summary(&self) {
        info!("{}", "=".repeat(60));
        info!("DIAGNOSTIC SUMMARY");
        info!("{}", "=".repeat(60));

        for result in &self.results {
            let status = if result.healthy() { "✓ PASS" } else { "✗ FAIL" };
            info!("{}: {}", result.motor_name(), status);
            for e in result.errors() {
                error!("  ERROR: {}", e);
            }
            for w in result.warnings() {
                warn!("  WARNING: {}", w);
            }
        }

        if self.all_healthy() {
            info!("✓ All motors passed diagnostics. You can proceed with calibration.");
        } else {
            error!("✗ Some motors failed diagnostics. Please fix the issues before calibrating.");
        }
    }
}

impl fmt::Display for BusDiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DIAGNOSTIC SUMMARY")?;
        for result in &self.results {
            let status = if result.healthy() { "PASS" } else { "FAIL" };
            write!(f, "  {:<16} {}", result.motor_name(), status)?;
            if let (Some(zero), Some(max)) = (result.zero_position(), result.max_position()) {
                write!(f, "  zero={} max={} span={}", zero, max, result.span())?;
            }
            writeln!(f)?;
            for e in result.errors() {
                writeln!(f, "    ERROR: {}", e)?;
            }
            for w in result.warnings() {
                writeln!(f, "    WARNING: {}", w)?;
            }
        }
        write!(
            f,
            "Overall: {}",
            if self.all_healthy() { "PASS" } else { "FAIL" }
        )
    }
}

/// A bus run stopped by the prompt before every motor was tested
#[derive(Debug, thiserror::Error)]
#[error("diagnostic run aborted after {} motor(s): {source}", .completed.len())]
pub struct RunAborted {
    /// Motors fully diagnosed before the abort
    pub completed: BusDiagnosticReport,
    #[source]
    pub source: PromptError,
}

/// Diagnose `motors` (or every motor on the bus) one after another.
///
/// Each motor gets a fresh diagnostic, so a failure on one motor never
/// leaks into another's result. Duplicate names are tested once.
/// A cancelled prompt stops the whole run; the motors finished so far are
/// summarized and handed back in the error.
pub fn diagnose_bus<B, P>(
    bus: &mut B,
    prompt: &mut P,
    motors: Option<&[String]>,
    options: &DiagnosticOptions,
) -> Result<BusDiagnosticReport, RunAborted>
where
    B: RegisterBus + ?Sized,
    P: OperatorPrompt + ?Sized,
{
    let requested = match motors {
        Some(subset) => subset.to_vec(),
        None => bus.list_motor_names(),
    };

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(requested.len());
    for name in requested {
        if !seen.insert(name.clone()) {
            continue;
        }
        match diagnose_motor(bus, prompt, &name, options) {
            Ok(result) => results.push(result),
            Err(source) => {
                warn!("Run aborted at {}: {}", name, source);
                let completed = BusDiagnosticReport::new(results);
                if !completed.is_empty() {
                    completed.log_summary();
                }
                return Err(RunAborted { completed, source });
            }
        }
    }

    let report = BusDiagnosticReport::new(results);
    report.log_summary();
    Ok(report)
}
