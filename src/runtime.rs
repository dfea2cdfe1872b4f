// Diagnostic run: open the bus, diagnose, report, optionally commit
//
// The diagnostics themselves are blocking (serial reads and operator prompts),
// so they run on tokio's blocking pool. Publishing the report is async.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::calibration::commit_calibration;
use crate::config::{REG_TORQUE_ENABLE, TOPIC_CALIBRATION_REPORT};
use crate::diagnostic::{BusDiagnosticReport, DiagnosticOptions, diagnose_bus};
use crate::messages::CalibrationReport;
use crate::motor::{FeetechBus, FeetechMotorsBus, Motor, RegisterBus};
use crate::prompt::TerminalPrompt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything one run needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub port: String,
    pub baudrate: u32,
    pub motors: Vec<Motor>,
    /// Caller subset; `None` tests every motor
    pub only: Option<Vec<String>>,
    pub options: DiagnosticOptions,
    /// Write `Torque_Enable=false` first so motors can be moved by hand
    pub release_torque: bool,
    pub json: bool,
    pub publish: bool,
    pub calibration_out: Option<PathBuf>,
}

/// Disable torque on the motors about to be tested.
/// Failures only warn: the position check will report an unreachable motor.
pub fn release_torque<B: RegisterBus + ?Sized>(bus: &mut B, motors: &[String]) {
    for name in motors {
        match bus.write(REG_TORQUE_ENABLE, name, false.into()) {
            Ok(()) => info!("Torque disabled on {}", name),
            Err(e) => warn!("Failed to disable torque on {}: {}", name, e),
        }
    }
}

/// Publish the report on the calibration topic
pub async fn publish_report(report: &CalibrationReport) -> Result<(), BoxError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CALIBRATION_REPORT).await?;

    publisher.put(serde_json::to_string(report)?).await?;
    info!("Published diagnostic report to {}", TOPIC_CALIBRATION_REPORT);

    session.close().await?;
    Ok(())
}

/// What a run writes to stdout: the report as JSON, or the text summary.
/// Logs and prompts go to stderr, so this is the whole of stdout.
pub fn render_report(report: &BusDiagnosticReport, json: bool) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string_pretty(&CalibrationReport::from(report))
    } else {
        Ok(format!("\n{}", report))
    }
}

/// Run diagnostics; returns whether every tested motor passed
pub async fn run(config: RunConfig) -> Result<bool, BoxError> {
    info!("Opening motor bus on {} ({} baud)", config.port, config.baudrate);
    let port = FeetechBus::open_with_baudrate(&config.port, config.baudrate)?;
    let mut bus = FeetechMotorsBus::new(port, config.motors.clone())?;

    let only = config.only.clone();
    let options = config.options;
    let release = config.release_torque && options.interactive;
    let (bus, report) = tokio::task::spawn_blocking(move || {
        let targets = only.clone().unwrap_or_else(|| bus.list_motor_names());
        if release {
            release_torque(&mut bus, &targets);
        }
        let mut prompt = TerminalPrompt::new();
        let report = diagnose_bus(&mut bus, &mut prompt, only.as_deref(), &options)?;
        Ok::<_, BoxError>((bus, report))
    })
    .await??;

    println!("{}", render_report(&report, config.json)?);

    if config.publish {
        publish_report(&CalibrationReport::from(&report)).await?;
    }

    if let Some(path) = config.calibration_out {
        offer_commit(report.clone(), bus.motors().to_vec(), path).await?;
    }

    Ok(report.all_healthy())
}

/// Ask before writing calibration; only offered when every motor passed
async fn offer_commit(
    report: BusDiagnosticReport,
    motors: Vec<Motor>,
    path: PathBuf,
) -> Result<(), BoxError> {
    if !report.all_healthy() {
        warn!("Diagnostics failed, not writing calibration to {}", path.display());
        return Ok(());
    }
    tokio::task::spawn_blocking(move || {
        let mut prompt = TerminalPrompt::new();
        if prompt.confirm("Diagnostics passed! Proceed with calibration?")? {
            commit_calibration(&report, &motors, &path)?;
        } else {
            info!("Calibration not written");
        }
        Ok::<_, BoxError>(())
    })
    .await?
}
