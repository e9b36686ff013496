//! Events delivered to the engine by the external dispatcher.

use edgefw_types::{ConnectionId, DatapathId, MacAddress, PortNo};
use serde::{Deserialize, Serialize};

/// A data-plane frame as decoded by the protocol driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPacket {
    #[serde(default)]
    pub src: Option<MacAddress>,
    #[serde(default)]
    pub dst: Option<MacAddress>,
    /// False when the driver could not fully decode the frame.
    #[serde(default = "default_parsed")]
    pub parsed: bool,
    /// The original frame, echoed back on flood/forward.
    #[serde(default)]
    pub data: Vec<u8>,
}

fn default_parsed() -> bool {
    true
}

impl ParsedPacket {
    pub fn new(src: MacAddress, dst: MacAddress, data: Vec<u8>) -> Self {
        Self {
            src: Some(src),
            dst: Some(dst),
            parsed: true,
            data,
        }
    }

    /// A frame the driver failed to decode.
    pub fn incomplete(data: Vec<u8>) -> Self {
        Self {
            src: None,
            dst: None,
            parsed: false,
            data,
        }
    }

    /// Source and destination addresses, or `None` for an incomplete frame.
    pub fn addresses(&self) -> Option<(MacAddress, MacAddress)> {
        if !self.parsed {
            return None;
        }
        Some((self.src?, self.dst?))
    }
}

/// Connection and packet notifications for a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchEvent {
    /// A switch finished its handshake.
    ConnectionUp {
        connection: ConnectionId,
        dpid: DatapathId,
    },
    /// A packet was sent to the controller.
    PacketIn {
        connection: ConnectionId,
        in_port: PortNo,
        packet: ParsedPacket,
    },
    /// The control connection was torn down.
    ConnectionDown { connection: ConnectionId },
}

impl SwitchEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            SwitchEvent::ConnectionUp { connection, .. }
            | SwitchEvent::PacketIn { connection, .. }
            | SwitchEvent::ConnectionDown { connection } => *connection,
        }
    }

    /// Short label for log records.
    pub fn kind(&self) -> &'static str {
        match self {
            SwitchEvent::ConnectionUp { .. } => "connection_up",
            SwitchEvent::PacketIn { .. } => "packet_in",
            SwitchEvent::ConnectionDown { .. } => "connection_down",
        }
    }
}
