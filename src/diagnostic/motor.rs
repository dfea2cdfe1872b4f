// Per-motor diagnostic
//
// Start -> PositionCheck -> AwaitZero -> AwaitMax -> Classify -> Probe(0..n) -> Done
//
// An unreadable position aborts straight to Done and no prompt is issued.
// A failed zero/max read also aborts but keeps what was already measured.
// Probe failures are warnings and the probe loop carries on.

use tracing::{error, info, warn};

use super::range::{
    CalibrationSample, RangeCalibrator, RangeResult, SampleRole, SpanClass, within_band,
};
use crate::config::{NARROW_THRESHOLD, PROBE_COUNT, REG_PRESENT_POSITION, WORKING_BAND};
use crate::motor::{CommunicationError, RegisterBus};
use crate::prompt::{OperatorPrompt, PromptError};

/// Knobs for a diagnostic run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticOptions {
    pub narrow_threshold: u32,
    pub probe_count: usize,
    /// When false only the position check runs
    pub interactive: bool,
    /// Percent band a probe may fall in without a warning
    pub working_band: (f64, f64),
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            narrow_threshold: NARROW_THRESHOLD,
            probe_count: PROBE_COUNT,
            interactive: true,
            working_band: WORKING_BAND,
        }
    }
}

/// A probe sample and where it lands on the calibrated range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReading {
    pub raw_position: i32,
    pub percent: f64,
}

/// Finalized outcome of one motor's diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticResult {
    motor_name: String,
    position_readable: bool,
    initial_position: Option<i32>,
    zero_position: Option<i32>,
    max_position: Option<i32>,
    span: i64,
    classification: Option<SpanClass>,
    probes: Vec<ProbeReading>,
    warnings: Vec<String>,
    errors: Vec<String>,
    healthy: bool,
}

impl DiagnosticResult {
    pub fn motor_name(&self) -> &str {
        &self.motor_name
    }

    pub fn position_readable(&self) -> bool {
        self.position_readable
    }

    /// Position read during the position check
    pub fn initial_position(&self) -> Option<i32> {
        self.initial_position
    }

    pub fn zero_position(&self) -> Option<i32> {
        self.zero_position
    }

    pub fn max_position(&self) -> Option<i32> {
        self.max_position
    }

    /// `max - zero`, 0 when either endpoint is missing
    pub fn span(&self) -> i64 {
        self.span
    }

    /// `None` when no span was measured
    pub fn classification(&self) -> Option<SpanClass> {
        self.classification
    }

    pub fn probes(&self) -> &[ProbeReading] {
        &self.probes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn healthy(&self) -> bool {
        self.healthy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    PositionCheck,
    AwaitZero,
    AwaitMax,
    Classify,
    Probe(usize),
    Done,
}

struct MotorDiagnostic<'a, B: ?Sized, P: ?Sized> {
    bus: &'a mut B,
    prompt: &'a mut P,
    options: &'a DiagnosticOptions,
    motor_name: &'a str,

    position_readable: bool,
    initial_position: Option<i32>,
    zero: Option<CalibrationSample>,
    max: Option<CalibrationSample>,
    range: Option<RangeResult>,
    probes: Vec<ProbeReading>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<'a, B, P> MotorDiagnostic<'a, B, P>
where
    B: RegisterBus + ?Sized,
    P: OperatorPrompt + ?Sized,
{
    fn new(
        bus: &'a mut B,
        prompt: &'a mut P,
        motor_name: &'a str,
        options: &'a DiagnosticOptions,
    ) -> Self {
        Self {
            bus,
            prompt,
            options,
            motor_name,
            position_readable: false,
            initial_position: None,
            zero: None,
            max: None,
            range: None,
            probes: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<DiagnosticResult, PromptError> {
        info!("{}", "=".repeat(60));
        info!("Diagnosing motor: {}", self.motor_name);
        info!("{}", "=".repeat(60));

        let mut stage = Stage::Start;
        while stage != Stage::Done {
            stage = self.step(stage)?;
        }
        Ok(self.finish())
    }

    fn step(&mut self, stage: Stage) -> Result<Stage, PromptError> {
        let next = match stage {
            Stage::Start => Stage::PositionCheck,
            Stage::PositionCheck => self.check_position(),
            Stage::AwaitZero => self.await_endpoint(SampleRole::Zero)?,
            Stage::AwaitMax => self.await_endpoint(SampleRole::Max)?,
            Stage::Classify => self.classify(),
            Stage::Probe(index) => self.probe(index)?,
            Stage::Done => Stage::Done,
        };
        Ok(next)
    }

    fn read_position(&mut self) -> Result<i32, CommunicationError> {
        let value = self.bus.read(REG_PRESENT_POSITION, self.motor_name)?;
        value.as_int().ok_or_else(|| CommunicationError::Malformed {
            motor: self.motor_name.to_string(),
            reason: format!("expected an integer position, got {:?}", value),
        })
    }

    /// Read the current position as a sample for `role`
    fn take_sample(&mut self, role: SampleRole) -> Result<CalibrationSample, CommunicationError> {
        let position = self.read_position()?;
        Ok(CalibrationSample::new(self.motor_name, position, role))
    }

    fn check_position(&mut self) -> Stage {
        match self.read_position() {
            Ok(position) => {
                info!("✓ Motor {} is readable. Current position: {}", self.motor_name, position);
                self.position_readable = true;
                self.initial_position = Some(position);
                if self.options.interactive {
                    Stage::AwaitZero
                } else {
                    Stage::Done
                }
            }
            Err(e) => {
                error!("✗ Cannot read position from {}: {}", self.motor_name, e);
                self.errors.push(format!("position not readable: {}", e));
                Stage::Done
            }
        }
    }

    fn await_endpoint(&mut self, role: SampleRole) -> Result<Stage, PromptError> {
        let (label, example, next) = match role {
            SampleRole::Zero => ("MINIMUM/ZERO", "fully closed", Stage::AwaitMax),
            _ => ("MAXIMUM", "fully open", Stage::Classify),
        };
        self.prompt.await_operator_ready(&format!(
            "Move '{}' to its {} position (e.g. {} for a gripper), then confirm.",
            self.motor_name, label, example
        ))?;

        let name = if role == SampleRole::Zero { "zero" } else { "maximum" };
        match self.take_sample(role) {
            Ok(sample) => {
                info!("{} position recorded for {}: {}", label, self.motor_name, sample.raw_position);
                if role == SampleRole::Zero {
                    self.zero = Some(sample);
                } else {
                    self.max = Some(sample);
                }
                Ok(next)
            }
            Err(e) => {
                error!("✗ Cannot read {} position of {}: {}", name, self.motor_name, e);
                self.errors.push(format!("cannot read {} position: {}", name, e));
                Ok(Stage::Done)
            }
        }
    }

    fn classify(&mut self) -> Stage {
        let (Some(zero), Some(max)) = (&self.zero, &self.max) else {
            return Stage::Done;
        };
        let threshold = self.options.narrow_threshold;
        let range = RangeCalibrator::new(threshold).calibrate_samples(zero, max);

        match range.classification() {
            SpanClass::Degenerate => {
                error!("✗ CRITICAL: position of {} did not change", self.motor_name);
                error!("   Possible causes: motor not connected, wrong motor ID, motor stuck or damaged");
                self.errors.push(format!(
                    "position did not change between zero and max ({}); normalizing against this range would divide by zero",
                    range.zero_position()
                ));
            }
            SpanClass::Narrow => {
                warn!("⚠ Small position range on {}: {}", self.motor_name, range.span());
                warn!("   Motor may have limited travel or was not moved through its full range");
                self.warnings.push(format!(
                    "very small position range ({} units, below {}); calibration may be unreliable",
                    range.span().unsigned_abs(),
                    threshold
                ));
            }
            SpanClass::Healthy => {
                info!("✓ Position range looks good: {} units", range.span());
            }
        }

        let degenerate = range.classification() == SpanClass::Degenerate;
        self.range = Some(range);
        if degenerate || self.options.probe_count == 0 {
            Stage::Done
        } else {
            Stage::Probe(0)
        }
    }

    fn probe(&mut self, index: usize) -> Result<Stage, PromptError> {
        let count = self.options.probe_count;
        let number = index + 1;
        self.prompt.await_operator_ready(&format!(
            "Probe {}/{}: move '{}' to another position within its range, then confirm.",
            number, count, self.motor_name
        ))?;

        let next = if number < count {
            Stage::Probe(number)
        } else {
            Stage::Done
        };

        let sample = match self.take_sample(SampleRole::Probe) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("⚠ Probe {} of {} not readable: {}", number, self.motor_name, e);
                self.warnings.push(format!("probe {} not readable: {}", number, e));
                return Ok(next);
            }
        };
        let position = sample.raw_position;
        let Some(percent) = self.range.as_ref().and_then(|r| r.normalize(position)) else {
            return Ok(next);
        };

        info!("  Probe {} position {} → calibrated value: {:.2}%", number, position, percent);
        self.probes.push(ProbeReading {
            raw_position: position,
            percent,
        });

        let (low, high) = self.options.working_band;
        if !within_band(percent, self.options.working_band) {
            warn!("⚠ Probe {} calibrates to {:.2}%, outside [{}, {}]", number, percent, low, high);
            self.warnings.push(format!(
                "probe {} at position {} calibrates to {:.2}%, outside the expected working range [{}, {}]",
                number, position, percent, low, high
            ));
        }
        Ok(next)
    }

    fn finish(self) -> DiagnosticResult {
        let classification = self.range.as_ref().map(RangeResult::classification);
        let healthy = self.errors.is_empty()
            && self.position_readable
            && classification != Some(SpanClass::Degenerate);

        DiagnosticResult {
            motor_name: self.motor_name.to_string(),
            position_readable: self.position_readable,
            initial_position: self.initial_position,
            zero_position: self.zero.map(|s| s.raw_position),
            max_position: self.max.map(|s| s.raw_position),
            span: self.range.as_ref().map_or(0, RangeResult::span),
            classification,
            probes: self.probes,
            warnings: self.warnings,
            errors: self.errors,
            healthy,
        }
    }
}

/// Run the full diagnostic for one motor.
///
/// Bus failures end up in the result; only a cancelled prompt is an `Err`.
pub fn diagnose_motor<B, P>(
    bus: &mut B,
    prompt: &mut P,
    motor_name: &str,
    options: &DiagnosticOptions,
) -> Result<DiagnosticResult, PromptError>
where
    B: RegisterBus + ?Sized,
    P: OperatorPrompt + ?Sized,
{
    MotorDiagnostic::new(bus, prompt, motor_name, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::testing::{ScriptedBus, ScriptedPrompt};

    fn run(bus: &mut ScriptedBus, prompt: &mut ScriptedPrompt) -> DiagnosticResult {
        diagnose_motor(bus, prompt, "gripper", &DiagnosticOptions::default()).unwrap()
    }

    #[test]
    fn test_unreadable_position_aborts_without_prompting() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.push_failure("gripper");
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(!result.position_readable());
        assert!(!result.healthy());
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].starts_with("position not readable"));
        assert_eq!(result.classification(), None);
        assert_eq!(result.span(), 0);
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_healthy_range_with_probes() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[2100, 2048, 3048, 2548, 2048, 3048]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(result.healthy());
        assert_eq!(result.initial_position(), Some(2100));
        assert_eq!(result.zero_position(), Some(2048));
        assert_eq!(result.max_position(), Some(3048));
        assert_eq!(result.span(), 1000);
        assert_eq!(result.classification(), Some(SpanClass::Healthy));
        let percents: Vec<f64> = result.probes().iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![50.0, 0.0, 100.0]);
        assert!(result.warnings().is_empty());
        assert!(result.errors().is_empty());
        // zero + max + three probes
        assert_eq!(prompt.calls(), 5);
    }

    #[test]
    fn test_degenerate_range_fails_and_skips_probes() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[2048, 2048, 2048]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(!result.healthy());
        assert!(result.position_readable());
        assert_eq!(result.span(), 0);
        assert_eq!(result.classification(), Some(SpanClass::Degenerate));
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].contains("divide by zero"));
        assert_eq!(prompt.calls(), 2);
    }

    #[test]
    fn test_narrow_range_warns_but_stays_healthy() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[2048, 2048, 2090, 2069, 2048, 2090]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(result.healthy());
        assert_eq!(result.span(), 42);
        assert_eq!(result.classification(), Some(SpanClass::Narrow));
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].contains("very small position range"));
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_narrow_warning_reports_magnitude_of_reversed_range() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[2090, 2090, 2048, 2069, 2090, 2048]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(result.healthy());
        assert_eq!(result.span(), -42);
        assert_eq!(result.classification(), Some(SpanClass::Narrow));
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].contains("(42 units, below 100)"));
        assert!(!result.warnings()[0].contains("-42"));
    }

    #[test]
    fn test_out_of_band_probes_warn_once_each() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        // probes at 150%, 50%, -30%
        bus.positions("gripper", &[0, 0, 1000, 1500, 500, -300]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(result.healthy());
        assert!(result.errors().is_empty());
        assert_eq!(result.warnings().len(), 2);
        assert!(result.warnings()[0].contains("150.00%"));
        assert!(result.warnings()[1].contains("-30.00%"));
    }

    #[test]
    fn test_failed_zero_read_aborts() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[1000]);
        bus.push_failure("gripper");
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(!result.healthy());
        assert!(result.position_readable());
        assert_eq!(result.zero_position(), None);
        assert_eq!(result.max_position(), None);
        assert_eq!(result.classification(), None);
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].starts_with("cannot read zero position"));
        assert_eq!(prompt.calls(), 1);
    }

    #[test]
    fn test_failed_max_read_keeps_zero() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[1000, 1100]);
        bus.push_failure("gripper");
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(!result.healthy());
        assert!(result.position_readable());
        assert_eq!(result.zero_position(), Some(1100));
        assert_eq!(result.max_position(), None);
        assert_eq!(result.classification(), None);
        assert!(result.errors()[0].starts_with("cannot read maximum position"));
        assert_eq!(prompt.calls(), 2);
    }

    #[test]
    fn test_failed_probe_is_a_warning_and_loop_continues() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[0, 0, 1000]);
        bus.push_failure("gripper");
        bus.positions("gripper", &[250, 750]);
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);

        assert!(result.healthy());
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].starts_with("probe 1 not readable"));
        assert_eq!(result.probes().len(), 2);
        assert_eq!(prompt.calls(), 5);
    }

    #[test]
    fn test_non_interactive_only_checks_position() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[1234]);
        let mut prompt = ScriptedPrompt::default();
        let options = DiagnosticOptions {
            interactive: false,
            ..Default::default()
        };

        let result = diagnose_motor(&mut bus, &mut prompt, "gripper", &options).unwrap();

        assert!(result.healthy());
        assert_eq!(result.initial_position(), Some(1234));
        assert_eq!(result.zero_position(), None);
        assert_eq!(prompt.calls(), 0);
    }

    #[test]
    fn test_probe_count_is_configurable() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[0, 0, 1000, 100]);
        let mut prompt = ScriptedPrompt::default();
        let options = DiagnosticOptions {
            probe_count: 1,
            ..Default::default()
        };

        let result = diagnose_motor(&mut bus, &mut prompt, "gripper", &options).unwrap();
        assert_eq!(result.probes().len(), 1);
        assert_eq!(prompt.calls(), 3);
    }

    #[test]
    fn test_cancelled_prompt_is_propagated() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[0, 0, 1000]);
        let mut prompt = ScriptedPrompt::cancel_at(1);

        let err = diagnose_motor(&mut bus, &mut prompt, "gripper", &DiagnosticOptions::default())
            .unwrap_err();
        assert!(matches!(err, PromptError::Cancelled));
    }

    #[test]
    fn test_samples_carry_their_role() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.positions("gripper", &[1700]);
        let mut prompt = ScriptedPrompt::default();
        let options = DiagnosticOptions::default();
        let mut diagnostic = MotorDiagnostic::new(&mut bus, &mut prompt, "gripper", &options);

        let sample = diagnostic.take_sample(SampleRole::Probe).unwrap();
        assert_eq!(sample, CalibrationSample::new("gripper", 1700, SampleRole::Probe));

        // Exhausted queue: the motor stopped answering
        assert!(diagnostic.take_sample(SampleRole::Probe).is_err());
    }

    #[test]
    fn test_boolean_position_is_malformed() {
        let mut bus = ScriptedBus::new(&["gripper"]);
        bus.push("gripper", Ok(true.into()));
        let mut prompt = ScriptedPrompt::default();

        let result = run(&mut bus, &mut prompt);
        assert!(!result.position_readable());
        assert!(result.errors()[0].contains("malformed response"));
    }
}
