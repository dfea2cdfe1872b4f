use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lekiwi_calibration::config::{
    DEFAULT_BAUDRATE, DEFAULT_MODEL, DEFAULT_MOTORS, DEFAULT_PORT, NARROW_THRESHOLD, PROBE_COUNT,
    WORKING_BAND,
};
use lekiwi_calibration::diagnostic::DiagnosticOptions;
use lekiwi_calibration::motor::Motor;
use lekiwi_calibration::runtime::{self, RunConfig};

/// Diagnose Feetech motor ranges before calibrating an arm
#[derive(Debug, Parser)]
#[command(name = "lekiwi-calibrate", version)]
struct Args {
    /// Serial port of the motor bus
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baudrate: u32,

    /// Motor table entry as name=id (repeatable, replaces the SO-100 table)
    #[arg(long = "motor", value_name = "NAME=ID", value_parser = parse_motor)]
    motors: Vec<Motor>,

    /// Only diagnose these motors (repeatable)
    #[arg(long, value_name = "NAME")]
    only: Vec<String>,

    /// Spans below this many raw units are reported as narrow
    #[arg(long, default_value_t = NARROW_THRESHOLD)]
    narrow_threshold: u32,

    /// Extra positions to probe after zero and max
    #[arg(long, default_value_t = PROBE_COUNT)]
    probes: usize,

    /// Only check that positions are readable, no prompts
    #[arg(long)]
    non_interactive: bool,

    /// Leave torque as it is instead of releasing it
    #[arg(long)]
    keep_torque: bool,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Publish the report over Zenoh
    #[arg(long)]
    publish: bool,

    /// Write calibration here when every motor passes
    #[arg(long, value_name = "PATH")]
    calibration_out: Option<PathBuf>,
}

fn parse_motor(s: &str) -> Result<Motor, String> {
    let (name, id) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ID, got '{}'", s))?;
    let id: u8 = id
        .trim()
        .parse()
        .map_err(|e| format!("invalid motor ID '{}': {}", id, e))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("motor name is empty".to_string());
    }
    Ok(Motor::new(name, id, DEFAULT_MODEL))
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        let motors = if args.motors.is_empty() {
            DEFAULT_MOTORS
                .iter()
                .map(|&(name, id)| Motor::new(name, id, DEFAULT_MODEL))
                .collect()
        } else {
            args.motors
        };

        Self {
            port: args.port,
            baudrate: args.baudrate,
            motors,
            only: (!args.only.is_empty()).then_some(args.only),
            options: DiagnosticOptions {
                narrow_threshold: args.narrow_threshold,
                probe_count: args.probes,
                interactive: !args.non_interactive,
                working_band: WORKING_BAND,
            },
            release_torque: !args.keep_torque,
            json: args.json,
            publish: args.publish,
            calibration_out: args.calibration_out,
        }
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug for bus traffic); stdout is the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match runtime::run(args.into()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            std::process::exit(1);
        }
    }
}
