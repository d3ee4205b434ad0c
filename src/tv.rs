use num_enum::{TryFromPrimitive, TryFromPrimitiveError};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum TVError {
    #[error("cec-client not found")]
    NotFound,
    #[error("cec-client timed out")]
    TimedOut,
    #[error("{0}")]
    CommandFailed(String),
    #[error("could not parse power status: {0}")]
    Parse(String),
    #[error("cec-client io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unknown,
    /// Reported text that matches none of the known states.
    Other(String),
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
            Self::Other(s) => s.as_str(),
        })
    }
}

/// HDMI port on the TV.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum Input {
    HDMI1 = 1,
    HDMI2 = 2,
    HDMI3 = 3,
    HDMI4 = 4,
}

impl Input {
    pub fn from_port(port: u8) -> Result<Self, TryFromPrimitiveError<Self>> {
        Self::try_from(port)
    }

    /// Physical address of the port, n.0.0.0.
    pub fn physical_address(self) -> u16 {
        (self as u16) << 12
    }
}

pub trait TVConnection: Send {
    fn power_state(&mut self) -> Result<PowerState, TVError>;
    fn power_on(&mut self, input: Option<Input>) -> Result<(), TVError>;
    fn power_off(&mut self) -> Result<(), TVError>;
}
