//! OpenFlow 1.0 port numbers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A switch port number as carried in OpenFlow 1.0 messages.
///
/// Physical ports occupy `1..=0xff00`; the values from `0xfff8` upward are
/// reserved virtual ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(u16);

impl PortNo {
    /// Highest number usable by a physical port.
    pub const MAX: PortNo = PortNo(0xff00);
    /// Send the packet back out the port it arrived on.
    pub const IN_PORT: PortNo = PortNo(0xfff8);
    /// Hand the packet to the switch's normal L2/L3 pipeline.
    pub const NORMAL: PortNo = PortNo(0xfffa);
    /// All ports except the ingress port (and those with flooding disabled).
    pub const FLOOD: PortNo = PortNo(0xfffb);
    /// All ports except the ingress port.
    pub const ALL: PortNo = PortNo(0xfffc);
    /// Send to the controller.
    pub const CONTROLLER: PortNo = PortNo(0xfffd);
    /// Not associated with any port.
    pub const NONE: PortNo = PortNo(0xffff);

    pub const fn new(raw: u16) -> Self {
        PortNo(raw)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true for the reserved virtual ports.
    pub const fn is_reserved(&self) -> bool {
        self.0 > Self::MAX.0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::IN_PORT => f.write_str("IN_PORT"),
            PortNo::NORMAL => f.write_str("NORMAL"),
            PortNo::FLOOD => f.write_str("FLOOD"),
            PortNo::ALL => f.write_str("ALL"),
            PortNo::CONTROLLER => f.write_str("CONTROLLER"),
            PortNo::NONE => f.write_str("NONE"),
            PortNo(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for PortNo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN_PORT" => Ok(PortNo::IN_PORT),
            "NORMAL" => Ok(PortNo::NORMAL),
            "FLOOD" => Ok(PortNo::FLOOD),
            "ALL" => Ok(PortNo::ALL),
            "CONTROLLER" => Ok(PortNo::CONTROLLER),
            "NONE" => Ok(PortNo::NONE),
            _ => s
                .parse::<u16>()
                .map(PortNo)
                .map_err(|_| ParseError::InvalidPort(s.to_string())),
        }
    }
}

impl From<u16> for PortNo {
    fn from(raw: u16) -> Self {
        PortNo(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reserved_ports() {
        assert!(PortNo::FLOOD.is_reserved());
        assert!(PortNo::ALL.is_reserved());
        assert!(!PortNo::new(1).is_reserved());
        assert!(!PortNo::MAX.is_reserved());
    }

    #[test]
    fn test_display() {
        assert_eq!(PortNo::new(3).to_string(), "3");
        assert_eq!(PortNo::FLOOD.to_string(), "FLOOD");
        assert_eq!(PortNo::NORMAL.to_string(), "NORMAL");
    }

    #[test]
    fn test_parse() {
        assert_eq!("7".parse::<PortNo>().unwrap(), PortNo::new(7));
        assert_eq!("all".parse::<PortNo>().unwrap(), PortNo::ALL);
        assert!("eth0".parse::<PortNo>().is_err());
        assert!("70000".parse::<PortNo>().is_err());
    }
}
