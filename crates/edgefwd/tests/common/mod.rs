//! Shared fixtures for edgefwd integration tests.

#![allow(dead_code)]

use edgefwd::{
    ActionBatch, ChannelSink, ConnectionId, Controller, DatapathId, EdgeSwitchSet, MacAddress,
    ParsedPacket, PortNo, RuleStore, SessionContext, SwitchEvent,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

pub const EDGE_SWITCH: &str = "00-00-00-00-00-04";
pub const EDGE_DPID: u64 = 4;
pub const CORE_DPID: u64 = 1;

/// Controller wired to an in-memory sink, with its rules loaded from a
/// temporary CSV file.
pub struct TestEnv {
    _rule_file: NamedTempFile,
    pub controller: Controller,
    pub batches: mpsc::Receiver<ActionBatch>,
}

impl TestEnv {
    /// Writes `csv` to a rule file and builds a controller over it with
    /// `00-00-00-00-00-04` as the only edge switch.
    pub fn with_rules(csv: &str) -> Self {
        Self::with_context(csv, |ctx| ctx)
    }

    /// Like [`TestEnv::with_rules`], letting the caller adjust the context.
    pub fn with_context(csv: &str, adjust: impl FnOnce(SessionContext) -> SessionContext) -> Self {
        let rule_file = write_rule_file(csv);
        let rules = RuleStore::load(rule_file.path()).expect("rule file should load");
        let ctx = adjust(SessionContext::new(rules, EdgeSwitchSet::new([EDGE_SWITCH])));
        let (sink, batches) = ChannelSink::new(64);

        Self {
            _rule_file: rule_file,
            controller: Controller::new(ctx, Arc::new(sink), 16),
            batches,
        }
    }

    /// Shuts the controller down and returns every batch it produced.
    pub async fn finish(self) -> Vec<ActionBatch> {
        let Self {
            _rule_file,
            controller,
            mut batches,
        } = self;
        controller.shutdown().await;

        let mut out = Vec::new();
        while let Some(batch) = batches.recv().await {
            out.push(batch);
        }
        out
    }
}

pub fn write_rule_file(csv: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp rule file");
    file.write_all(csv.as_bytes()).expect("write rule file");
    file.flush().expect("flush rule file");
    file
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x00, 0x00, 0x00, 0x00, 0x00, last])
}

pub fn connection_up(connection: u64, dpid: u64) -> SwitchEvent {
    SwitchEvent::ConnectionUp {
        connection: ConnectionId::new(connection),
        dpid: DatapathId::new(dpid),
    }
}

pub fn packet_in(connection: u64, in_port: u16, src: MacAddress, dst: MacAddress) -> SwitchEvent {
    SwitchEvent::PacketIn {
        connection: ConnectionId::new(connection),
        in_port: PortNo::new(in_port),
        packet: ParsedPacket::new(src, dst, vec![0xde, 0xad]),
    }
}

pub fn connection_down(connection: u64) -> SwitchEvent {
    SwitchEvent::ConnectionDown {
        connection: ConnectionId::new(connection),
    }
}
