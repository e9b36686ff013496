//! Switch and connection identities.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An OpenFlow datapath id (64 bits).
///
/// The string form is the one used for edge-switch configuration: the low
/// 48 bits as dash-separated lowercase hex octets, with `|<n>` appended when
/// the high 16 bits carry a nonzero value.
///
/// ```
/// use edgefw_types::DatapathId;
///
/// assert_eq!(DatapathId::new(4).to_string(), "00-00-00-00-00-04");
/// assert_eq!(DatapathId::new(0x0002_0000_0000_00ff).to_string(), "00-00-00-00-00-ff|2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(u64);

impl DatapathId {
    pub const fn new(raw: u64) -> Self {
        DatapathId(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Upper 16 bits, rendered after the `|` when nonzero.
    pub const fn high_bits(&self) -> u16 {
        (self.0 >> 48) as u16
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, byte) in bytes[2..].iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        match self.high_bits() {
            0 => Ok(()),
            high => write!(f, "|{high}"),
        }
    }
}

impl FromStr for DatapathId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidDatapathId(s.to_string());

        let (low, high) = match s.split_once('|') {
            Some((low, high)) => (low, high.parse::<u16>().map_err(|_| invalid())?),
            None => (s, 0),
        };

        let octets: Vec<&str> = low.split(['-', ':']).collect();
        if octets.len() != 6 {
            return Err(invalid());
        }

        let mut raw = u64::from(high);
        for octet in octets {
            if octet.len() != 2 {
                return Err(invalid());
            }
            let byte = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
            raw = (raw << 8) | u64::from(byte);
        }

        Ok(DatapathId(raw))
    }
}

impl From<u64> for DatapathId {
    fn from(raw: u64) -> Self {
        DatapathId(raw)
    }
}

/// Handle for one switch control connection, assigned by the driver.
///
/// Distinct connections may report the same [`DatapathId`] (a switch that
/// reconnects), so sessions are keyed by this value rather than the dpid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        ConnectionId(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}
