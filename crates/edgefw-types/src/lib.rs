//! Switch identity and address types for the edgefw controller.
//!
//! This crate provides the primitives shared by the decision engine and
//! whatever protocol driver sits underneath it:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`DatapathId`]: OpenFlow datapath ids and their dash-separated string form
//! - [`PortNo`]: OpenFlow 1.0 port numbers, including reserved ports
//! - [`ConnectionId`]: opaque handle for one switch control connection

mod datapath;
mod mac;
mod port;

pub use datapath::{ConnectionId, DatapathId};
pub use mac::MacAddress;
pub use port::PortNo;

/// Ethertype for IPv4 frames (`dl_type` match value).
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// IP protocol number for TCP (`nw_proto` match value).
pub const IP_PROTO_TCP: u8 = 6;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),
}
