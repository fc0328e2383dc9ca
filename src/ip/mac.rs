//! MAC address value type.
//!
//! MACs are kept as the low 48 bits of a `u64` so the generators can count
//! through them, and are rendered in the usual colon-separated form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of distinct 48-bit MAC addresses.
pub const MAC_SPACE: u64 = 1 << 48;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(u64);

impl MacAddress {
    /// Build a MAC from its integer value. Returns `None` above 48 bits.
    pub fn from_u64(value: u64) -> Option<Self> {
        (value < MAC_SPACE).then_some(Self(value))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn octets(&self) -> [u8; 6] {
        let bytes = self.0.to_be_bytes();
        [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error returned when a MAC string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid MAC address: {0}")]
pub struct ParseMacError(pub String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError(s.to_string()));
        }
        let mut value = 0u64;
        for part in parts {
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            let byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
            value = (value << 8) | byte as u64;
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseMacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}
