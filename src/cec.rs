pub mod client;
pub mod noop;

use crate::tv::{PowerState, TVError};
use num_enum::TryFromPrimitive;
use std::fmt;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[allow(dead_code)]
pub enum LogicalAddress {
    TV = 0,
    RecordingDevice1 = 1,
    RecordingDevice2 = 2,
    Tuner1 = 3,
    PlaybackDevice1 = 4,
    AudioSystem = 5,
    Tuner2 = 6,
    Tuner3 = 7,
    PlaybackDevice2 = 8,
    RecordingDevice3 = 9,
    Tuner4 = 10,
    PlaybackDevice3 = 11,
    Reserved1 = 12,
    Reserved2 = 13,
    FreeUse = 14,
    Broadcast = 15,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    ActiveSource = 0x82,
}

pub type PhysicalAddress = u16;

/// Messages sent as raw frames. Power commands go through cec-client's own
/// `on`/`standby`/`pow` commands instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CECMessage {
    ActiveSource { physical_address: PhysicalAddress },
}

impl CECMessage {
    fn get_opcode(&self) -> Opcode {
        match &self {
            CECMessage::ActiveSource { .. } => Opcode::ActiveSource,
        }
    }

    fn get_parameters(&self) -> Vec<u8> {
        match &self {
            CECMessage::ActiveSource { physical_address } => physical_address.to_be_bytes().to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CECCommand {
    pub initiator: LogicalAddress,
    pub destination: LogicalAddress,
    pub message: CECMessage,
}

impl CECCommand {
    /// Header byte followed by opcode and operands.
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = vec![
            (self.initiator as u8) << 4 | self.destination as u8,
            self.message.get_opcode() as u8,
        ];
        frame.extend(self.message.get_parameters());
        frame
    }
}

/// A single line written to cec-client's stdin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    On(LogicalAddress),
    Standby(LogicalAddress),
    PowerStatus(LogicalAddress),
    Transmit(CECCommand),
}

impl ClientCommand {
    /// Short name used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::On(_) => "on",
            Self::Standby(_) => "standby",
            Self::PowerStatus(_) => "pow",
            Self::Transmit(_) => "tx",
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::On(addr) => write!(f, "on {:x}", *addr as u8),
            Self::Standby(addr) => write!(f, "standby {:x}", *addr as u8),
            Self::PowerStatus(addr) => write!(f, "pow {:x}", *addr as u8),
            Self::Transmit(cmd) => {
                let bytes: Vec<String> = cmd.frame().iter().map(|b| format!("{:02X}", b)).collect();
                write!(f, "tx {}", bytes.join(":"))
            }
        }
    }
}

const POWER_STATUS_PREFIX: &str = "power status:";

/// Reads the power state out of the output of a `pow` command.
pub fn parse_power_status(output: &str) -> Result<PowerState, TVError> {
    for line in output.lines() {
        // ASCII lowercasing keeps byte offsets shared with `line`.
        let lower = line.to_ascii_lowercase();
        let Some(idx) = lower.find(POWER_STATUS_PREFIX) else {
            continue;
        };
        let start = idx + POWER_STATUS_PREFIX.len();
        return Ok(match lower[start..].trim() {
            "on" | "in transition from standby to on" => PowerState::On,
            "standby" | "in transition from on to standby" => PowerState::Off,
            "unknown" => PowerState::Unknown,
            _ => PowerState::Other(line[start..].trim().to_string()),
        });
    }
    Err(TVError::Parse(output.to_string()))
}
