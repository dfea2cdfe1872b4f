// Feetech STS/SCS serial protocol implementation
//
// Protocol is similar to Dynamixel Protocol 1.0:
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use crate::config::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT_MS};

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set (only what the diagnostics need)
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Whether a register may be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// How the raw register bytes map to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Unsigned,
    Bool,
    /// Bit `sign_bit` is the direction, lower bits the magnitude
    SignMagnitude { sign_bit: u8 },
}

/// One entry of the STS3215 control table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub address: u8,
    pub width: u8,
    pub access: Access,
    pub encoding: Encoding,
}

const fn reg(
    name: &'static str,
    address: u8,
    width: u8,
    access: Access,
    encoding: Encoding,
) -> Register {
    Register {
        name,
        address,
        width,
        access,
        encoding,
    }
}

/// Control table for STS3215, addressed by the names used in robot configs
pub static CONTROL_TABLE: [Register; 11] = [
    // EEPROM area (persists across power cycles)
    reg("Model_Number", 3, 2, Access::ReadOnly, Encoding::Unsigned),
    reg("ID", 5, 1, Access::ReadWrite, Encoding::Unsigned),
    reg("Min_Position_Limit", 9, 2, Access::ReadWrite, Encoding::Unsigned),
    reg("Max_Position_Limit", 11, 2, Access::ReadWrite, Encoding::Unsigned),
    reg("Homing_Offset", 31, 2, Access::ReadWrite, Encoding::SignMagnitude { sign_bit: 11 }),
    // RAM area (volatile)
    reg("Operating_Mode", 33, 1, Access::ReadWrite, Encoding::Unsigned),
    reg("Torque_Enable", 40, 1, Access::ReadWrite, Encoding::Bool),
    reg("Goal_Position", 42, 2, Access::ReadWrite, Encoding::Unsigned),
    reg("Lock", 55, 1, Access::ReadWrite, Encoding::Bool),
    reg("Present_Position", 56, 2, Access::ReadOnly, Encoding::Unsigned),
    reg("Present_Velocity", 58, 2, Access::ReadOnly, Encoding::SignMagnitude { sign_bit: 15 }),
];

/// Look up a register by its control-table name
pub fn register(name: &str) -> Option<&'static Register> {
    CONTROL_TABLE.iter().find(|r| r.name == name)
}

/// Error types for Feetech communication
#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Feetech motor bus - handles serial communication with motors
///
/// Generic over the byte stream so tests can run against an in-memory port.
pub struct FeetechBus<P = Box<dyn SerialPort>> {
    port: P,
}

impl FeetechBus {
    /// Open a new connection to the motor bus
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }
}

impl<P: Read + Write> FeetechBus<P> {
    /// Wrap an already opened byte stream
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        let checksum_data = &packet[2..]; // skip header
        packet.push(Self::checksum(checksum_data));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Fill `buf`, mapping a serial timeout onto the motor being addressed
    fn read_exact_from(&mut self, id: u8, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                FeetechError::Timeout { id }
            }
            _ => FeetechError::Io(e),
        })
    }

    /// Read a status packet and return its parameters
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.read_exact_from(expected_id, &mut header)?;

        if header != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.read_exact_from(expected_id, &mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        // At least the error byte and the checksum
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length field too short: {}", length),
            });
        }

        let mut remaining = vec![0u8; length];
        self.read_exact_from(id, &mut remaining)?;

        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..length - 1]);
        if Self::checksum(&checksum_data) != remaining[length - 1] {
            return Err(FeetechError::ChecksumMismatch { id });
        }

        let error_status = remaining[0];
        if error_status != 0 {
            return Err(FeetechError::MotorError {
                id,
                status: error_status,
            });
        }

        Ok(remaining[1..length - 1].to_vec())
    }

    /// Ping a motor to check if it's connected
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read the raw little-endian bytes of a register
    pub fn read_raw(&mut self, id: u8, register: &Register) -> Result<u16> {
        let params = [register.address, register.width];
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < register.width as usize {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!(
                    "Expected {} bytes for {}, got {}",
                    register.width,
                    register.name,
                    response.len()
                ),
            });
        }

        let raw = match register.width {
            1 => response[0] as u16,
            _ => u16::from_le_bytes([response[0], response[1]]),
        };
        debug!("Read motor {}: reg={}, raw={}", id, register.name, raw);
        Ok(raw)
    }

    /// Write raw bytes (little-endian, `register.width` long) to a register
    pub fn write_raw(&mut self, id: u8, register: &Register, raw: u16) -> Result<()> {
        let mut params = vec![register.address, (raw & 0xFF) as u8];
        if register.width == 2 {
            params.push((raw >> 8) as u8);
        }
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write motor {}: reg={}, raw={}", id, register.name, raw);
        self.send_packet(&packet)?;

        // Read status response
        let _ = self.read_response(id)?;
        Ok(())
    }

    /// Give back the underlying port
    pub fn into_inner(self) -> P {
        self.port
    }
}

/// Encode a signed value to sign-magnitude format.
/// Returns `None` when the magnitude does not fit below `sign_bit`.
pub fn encode_sign_magnitude(value: i32, sign_bit: u8) -> Option<u16> {
    let max_magnitude = (1u32 << sign_bit) - 1;
    let magnitude = value.unsigned_abs();
    if magnitude > max_magnitude {
        return None;
    }
    let magnitude = magnitude as u16;
    if value < 0 {
        Some((1u16 << sign_bit) | magnitude)
    } else {
        Some(magnitude)
    }
}

/// Decode sign-magnitude format to a signed value
pub fn decode_sign_magnitude(raw: u16, sign_bit: u8) -> i32 {
    let magnitude = (raw & ((1u16 << sign_bit) - 1)) as i32;
    if raw & (1u16 << sign_bit) != 0 {
        -magnitude
    } else {
        magnitude
    }
}
