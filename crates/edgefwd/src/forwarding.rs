//! Learning-bridge forwarding decisions.
//!
//! For each packet-in the source address is learned on the ingress port.
//! If the destination is still unknown the packet is flooded; otherwise flow
//! entries for both directions are installed so the rest of the
//! conversation stays in the switch fast path.

use crate::error::ForwardingError;
use crate::event::ParsedPacket;
use crate::flow::{FlowMatch, InstallFlow, SwitchAction};
use crate::learning::LearningTable;
use edgefw_types::{ConnectionId, PortNo};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which ports an unknown-destination packet is flooded to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloodMode {
    /// Every port except the one the packet arrived on.
    #[default]
    ExcludeIngress,
    /// Every port, ingress included.
    AllPorts,
}

/// Packet-in decision logic for one connection.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    connection: ConnectionId,
    flood_mode: FloodMode,
}

impl ForwardingEngine {
    pub fn new(connection: ConnectionId, flood_mode: FloodMode) -> Self {
        Self {
            connection,
            flood_mode,
        }
    }

    pub fn flood_mode(&self) -> FloodMode {
        self.flood_mode
    }

    /// Learns the packet's source and decides how to deliver it.
    ///
    /// Returns either a single flood, or exactly two installs: the reverse
    /// direction first, then the forward direction carrying the packet.
    pub fn handle_packet(
        &self,
        table: &mut LearningTable,
        in_port: PortNo,
        packet: ParsedPacket,
    ) -> Result<Vec<SwitchAction>, ForwardingError> {
        let (src, dst) = packet
            .addresses()
            .ok_or(ForwardingError::IncompletePacket {
                connection: self.connection,
                in_port,
            })?;

        table.learn(src, in_port);

        let Some(dst_port) = table.lookup(&dst) else {
            let exclude_port = match self.flood_mode {
                FloodMode::ExcludeIngress => Some(in_port),
                FloodMode::AllPorts => None,
            };
            debug!(
                connection = %self.connection,
                src = %src,
                dst = %dst,
                in_port = %in_port,
                "Destination unknown, flooding"
            );
            return Ok(vec![SwitchAction::Flood {
                exclude_port,
                payload: packet.data,
            }]);
        };

        let reverse = InstallFlow::output(FlowMatch::l2(dst, src), in_port);
        let forward =
            InstallFlow::output(FlowMatch::l2(src, dst), dst_port).with_payload(packet.data);

        debug!(
            connection = %self.connection,
            "Installing {}.{} -> {}.{} AND {}.{} -> {}.{}",
            dst, dst_port, src, in_port, src, in_port, dst, dst_port
        );

        Ok(vec![reverse.into(), forward.into()])
    }
}
