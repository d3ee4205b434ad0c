use log::warn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, UdpSocket};
use std::path::Path;
use std::str::FromStr;

const SYNCHRONIZATION_SCHEME: [u8; 6] = [0xff; 6];
pub const WOL_PORT: u16 = 9;

#[derive(thiserror::Error, Debug)]
pub enum WolError {
    #[error("invalid MAC address")]
    BadMac,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl FromStr for MacAddr {
    type Err = WolError;

    /// Accepts `:` or `-` separated hex, or twelve bare hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.is_ascii() {
            return Err(WolError::BadMac);
        }
        let mut mac = [0u8; 6];
        for (i, b) in mac.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| WolError::BadMac)?;
        }
        Ok(MacAddr(mac))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02x}", b)).collect();
        f.write_str(&parts.join(":"))
    }
}

pub fn magic_packet(mac_address: MacAddr) -> Vec<u8> {
    let mut data: Vec<u8> = SYNCHRONIZATION_SCHEME.to_vec();
    for _ in 0..16 {
        data.extend(&mac_address.0);
    }
    data
}

pub fn wake(mac_address: MacAddr, broadcast: Ipv4Addr) -> std::io::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_broadcast(true)?;
    socket.send_to(&magic_packet(mac_address), (broadcast, WOL_PORT))?;
    Ok(())
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub mac: String,
}

pub type Targets = BTreeMap<String, Target>;

/// Loads the named wake targets. A missing or unreadable file yields no targets.
pub fn load_targets(path: &Path) -> Targets {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("WoL targets file {} not loaded: {}", path.display(), e);
            return Targets::new();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("invalid JSON in {}: {}", path.display(), e);
        Targets::new()
    })
}
