// Serial port, motor table, diagnostic thresholds, topics

// Serial port for the Feetech motor controller
pub const DEFAULT_PORT: &str = "/dev/tty.usbmodem58760431541";

// Feetech serial defaults
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

// Motor model tag for every servo on the SO-100 arm
pub const DEFAULT_MODEL: &str = "sts3215";

// SO-100 follower arm motor table (name, bus ID)
pub const DEFAULT_MOTORS: [(&str, u8); 6] = [
    ("shoulder_pan", 1),
    ("shoulder_lift", 2),
    ("elbow_flex", 3),
    ("wrist_flex", 4),
    ("wrist_roll", 5),
    ("gripper", 6),
];

// Registers the diagnostic relies on
pub const REG_PRESENT_POSITION: &str = "Present_Position";
pub const REG_TORQUE_ENABLE: &str = "Torque_Enable";

// Spans below this many raw units are classified as narrow.
// Some tooling used 10 for coarse devices; 100 fits 12-bit encoders.
pub const NARROW_THRESHOLD: u32 = 100;

// Number of probe samples after zero/max are known
pub const PROBE_COUNT: usize = 3;

// Normalized percent band a probe may land in without a warning
pub const WORKING_BAND: (f64, f64) = (-10.0, 110.0);

// Zenoh topic for diagnostic reports
pub const TOPIC_CALIBRATION_REPORT: &str = "lekiwi/state/calibration";
