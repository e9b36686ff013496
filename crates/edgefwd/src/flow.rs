//! Abstract switch actions produced by the decision engine.
//!
//! These are intents, not wire messages: the protocol driver turns an
//! [`InstallFlow`] into a flow-mod and a [`SwitchAction::Flood`] or
//! [`SwitchAction::Forward`] into a packet-out.

use edgefw_types::{ConnectionId, MacAddress, PortNo, ETH_TYPE_IPV4, IP_PROTO_TCP};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Header fields a flow entry matches on. Unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_src: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_dst: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_src: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_dst: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_proto: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    /// Matches a link-layer source/destination pair.
    pub fn l2(src: MacAddress, dst: MacAddress) -> Self {
        Self {
            dl_src: Some(src),
            dl_dst: Some(dst),
            ..Self::default()
        }
    }

    /// Matches IPv4 traffic between a source/destination pair.
    pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            dl_type: Some(ETH_TYPE_IPV4),
            nw_src: Some(src),
            nw_dst: Some(dst),
            ..Self::default()
        }
    }

    /// Narrows the match to TCP traffic for one destination port.
    ///
    /// OpenFlow 1.0 ignores `tp_dst` unless `nw_proto` is set, so both are
    /// filled in.
    pub fn with_tcp_dst(mut self, port: u16) -> Self {
        self.nw_proto = Some(IP_PROTO_TCP);
        self.tp_dst = Some(port);
        self
    }

    /// Returns true if every field is wildcarded.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(v) = self.dl_src {
            fields.push(format!("dl_src={v}"));
        }
        if let Some(v) = self.dl_dst {
            fields.push(format!("dl_dst={v}"));
        }
        if let Some(v) = self.dl_type {
            fields.push(format!("dl_type=0x{v:04x}"));
        }
        if let Some(v) = self.nw_src {
            fields.push(format!("nw_src={v}"));
        }
        if let Some(v) = self.nw_dst {
            fields.push(format!("nw_dst={v}"));
        }
        if let Some(v) = self.nw_proto {
            fields.push(format!("nw_proto={v}"));
        }
        if let Some(v) = self.tp_dst {
            fields.push(format!("tp_dst={v}"));
        }
        if fields.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&fields.join(","))
        }
    }
}

/// An action attached to a flow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "port", rename_all = "snake_case")]
pub enum FlowAction {
    Output(PortNo),
}

/// A flow entry to install on the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallFlow {
    #[serde(rename = "match")]
    pub flow_match: FlowMatch,
    #[serde(default)]
    pub actions: Vec<FlowAction>,
    /// Packet the switch should run through the new entry right away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl InstallFlow {
    /// A match-only entry with no actions.
    pub fn new(flow_match: FlowMatch) -> Self {
        Self {
            flow_match,
            actions: Vec::new(),
            payload: None,
        }
    }

    /// An entry that outputs matching packets on `port`.
    pub fn output(flow_match: FlowMatch, port: PortNo) -> Self {
        Self::new(flow_match).with_action(FlowAction::Output(port))
    }

    pub fn with_action(mut self, action: FlowAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The first output port among the actions, if any.
    pub fn output_port(&self) -> Option<PortNo> {
        self.actions.iter().map(|FlowAction::Output(port)| *port).next()
    }

    /// Lowers an install-with-payload into an install without payload plus
    /// an explicit forward of that payload, for drivers that cannot attach
    /// packet data to a flow-mod.
    ///
    /// The forward is only produced when the entry both carries a payload
    /// and has an output port.
    pub fn split_forward(mut self) -> (InstallFlow, Option<SwitchAction>) {
        let forward = match (self.output_port(), self.payload.take()) {
            (Some(output_port), Some(payload)) => Some(SwitchAction::Forward {
                output_port,
                payload,
            }),
            (None, payload) => {
                self.payload = payload;
                None
            }
            (Some(_), None) => None,
        };
        (self, forward)
    }
}

impl fmt::Display for InstallFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.output_port() {
            Some(port) => write!(f, "{} -> output:{}", self.flow_match, port),
            None => write!(f, "{} -> (no action)", self.flow_match),
        }
    }
}

/// One intent handed to the protocol driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchAction {
    /// Send the packet out every port, except `exclude_port` when set.
    Flood {
        exclude_port: Option<PortNo>,
        #[serde(default)]
        payload: Vec<u8>,
    },
    /// Send the packet out a single port.
    Forward {
        output_port: PortNo,
        #[serde(default)]
        payload: Vec<u8>,
    },
    /// Install a flow entry.
    InstallFlow(InstallFlow),
}

impl SwitchAction {
    pub fn is_flood(&self) -> bool {
        matches!(self, SwitchAction::Flood { .. })
    }

    pub fn as_install(&self) -> Option<&InstallFlow> {
        match self {
            SwitchAction::InstallFlow(install) => Some(install),
            _ => None,
        }
    }
}

impl From<InstallFlow> for SwitchAction {
    fn from(install: InstallFlow) -> Self {
        SwitchAction::InstallFlow(install)
    }
}

/// All actions produced by one event, delivered to the driver as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBatch {
    pub connection: ConnectionId,
    pub actions: Vec<SwitchAction>,
}

impl ActionBatch {
    pub fn new(connection: ConnectionId, actions: Vec<SwitchAction>) -> Self {
        Self {
            connection,
            actions,
        }
    }

    pub fn installs(&self) -> impl Iterator<Item = &InstallFlow> {
        self.actions.iter().filter_map(SwitchAction::as_install)
    }
}
