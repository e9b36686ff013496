//! Per-connection switch session.
//!
//! A [`SwitchSession`] owns the learning table for exactly one switch
//! connection and routes that connection's events to the forwarding engine
//! and policy installer. [`run_session`] drives a session as an actor: one
//! task, one ordered channel, one event handled to completion at a time, so
//! the policy batch from a connection-up is always delivered before any
//! packet-in on the same connection is looked at.

use crate::config::EdgefwConfig;
use crate::edge::EdgeSwitchSet;
use crate::event::{ParsedPacket, SwitchEvent};
use crate::flow::{ActionBatch, SwitchAction};
use crate::forwarding::{FloodMode, ForwardingEngine};
use crate::learning::LearningTable;
use crate::policy::{PolicyInstaller, PortRestriction, RuleAction};
use crate::rules::RuleStore;
use crate::sink::ActionSink;
use edgefw_types::{ConnectionId, DatapathId, PortNo};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Process-wide, read-only state shared by every session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub rules: Arc<RuleStore>,
    pub edge_switches: Arc<EdgeSwitchSet>,
    pub flood_mode: FloodMode,
    pub rule_action: RuleAction,
    pub port_restriction: PortRestriction,
}

impl SessionContext {
    pub fn new(rules: RuleStore, edge_switches: EdgeSwitchSet) -> Self {
        Self {
            rules: Arc::new(rules),
            edge_switches: Arc::new(edge_switches),
            flood_mode: FloodMode::default(),
            rule_action: RuleAction::default(),
            port_restriction: PortRestriction::default(),
        }
    }

    /// Builds the context from daemon configuration and a loaded rule set.
    pub fn from_config(config: &EdgefwConfig, rules: RuleStore) -> Self {
        Self {
            flood_mode: config.forwarding.flood_mode,
            rule_action: config.policy.rule_action,
            port_restriction: config.policy.port_restriction,
            ..Self::new(rules, config.edge_switch_set())
        }
    }
}

/// Counters for one session, logged when it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub packets_in: u64,
    pub incomplete_packets: u64,
    pub floods: u64,
    pub flow_installs: u64,
    pub policy_installs: u64,
}

/// State and event handling for one switch connection.
#[derive(Debug)]
pub struct SwitchSession {
    connection: ConnectionId,
    dpid: Option<DatapathId>,
    learning: LearningTable,
    forwarding: ForwardingEngine,
    policy: PolicyInstaller,
    stats: SessionStats,
}

impl SwitchSession {
    pub fn new(connection: ConnectionId, ctx: &SessionContext) -> Self {
        let policy = PolicyInstaller::new(ctx.rules.clone(), ctx.edge_switches.clone())
            .with_rule_action(ctx.rule_action)
            .with_port_restriction(ctx.port_restriction);

        Self {
            connection,
            dpid: None,
            learning: LearningTable::new(),
            forwarding: ForwardingEngine::new(connection, ctx.flood_mode),
            policy,
            stats: SessionStats::default(),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Datapath id reported by the connection-up, once seen.
    pub fn dpid(&self) -> Option<DatapathId> {
        self.dpid
    }

    pub fn learning_table(&self) -> &LearningTable {
        &self.learning
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Handles one event and returns the actions it produced.
    pub fn handle_event(&mut self, event: SwitchEvent) -> Vec<SwitchAction> {
        if event.connection() != self.connection {
            warn!(
                session = %self.connection,
                event_connection = %event.connection(),
                kind = event.kind(),
                "Ignoring event for another connection"
            );
            return Vec::new();
        }

        match event {
            SwitchEvent::ConnectionUp { dpid, .. } => self.on_connection_up(dpid),
            SwitchEvent::PacketIn {
                in_port, packet, ..
            } => self.on_packet_in(in_port, packet),
            SwitchEvent::ConnectionDown { .. } => {
                info!(connection = %self.connection, "Connection down");
                Vec::new()
            }
        }
    }

    /// Pushes the firewall rules if this is an edge switch.
    pub fn on_connection_up(&mut self, dpid: DatapathId) -> Vec<SwitchAction> {
        let switch_id = dpid.to_string();
        info!(connection = %self.connection, switch = %switch_id, "Switch has come up");
        self.dpid = Some(dpid);

        let installs = self.policy.on_connection_established(&switch_id);
        self.stats.policy_installs += installs.len() as u64;
        installs.into_iter().map(SwitchAction::from).collect()
    }

    /// Learns from and forwards one packet.
    pub fn on_packet_in(&mut self, in_port: PortNo, packet: ParsedPacket) -> Vec<SwitchAction> {
        self.stats.packets_in += 1;

        match self
            .forwarding
            .handle_packet(&mut self.learning, in_port, packet)
        {
            Ok(actions) => {
                for action in &actions {
                    match action {
                        SwitchAction::Flood { .. } => self.stats.floods += 1,
                        SwitchAction::InstallFlow(_) => self.stats.flow_installs += 1,
                        SwitchAction::Forward { .. } => {}
                    }
                }
                actions
            }
            Err(e) => {
                self.stats.incomplete_packets += 1;
                warn!(error = %e, "Dropping packet");
                Vec::new()
            }
        }
    }
}

/// Runs `session` until its channel closes, a connection-down arrives, or
/// `cancel` fires. On cancellation, events already queued are still handled.
///
/// Each event's actions are delivered as one batch before the next event is
/// received. Delivery failures are logged and not retried.
pub async fn run_session(
    mut session: SwitchSession,
    mut rx: mpsc::Receiver<SwitchEvent>,
    sink: Arc<dyn ActionSink>,
    cancel: CancellationToken,
) -> SessionStats {
    let connection = session.connection();
    debug!(connection = %connection, "Session started");

    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(event) => {
                    if !step(&mut session, event, sink.as_ref()).await {
                        break;
                    }
                }
                None => break,
            },
            () = cancel.cancelled() => {
                rx.close();
                while let Some(event) = rx.recv().await {
                    if !step(&mut session, event, sink.as_ref()).await {
                        break;
                    }
                }
                break;
            }
        }
    }

    let stats = session.stats();
    let learning = session.learning_table().stats();
    info!(
        connection = %connection,
        packets_in = stats.packets_in,
        incomplete_packets = stats.incomplete_packets,
        floods = stats.floods,
        flow_installs = stats.flow_installs,
        policy_installs = stats.policy_installs,
        stations = session.learning_table().len(),
        station_moves = learning.entries_moved,
        "Session ended"
    );
    stats
}

/// Handles one event; returns false once the session should stop.
async fn step(session: &mut SwitchSession, event: SwitchEvent, sink: &dyn ActionSink) -> bool {
    let last = matches!(
        event,
        SwitchEvent::ConnectionDown { connection } if connection == session.connection()
    );
    let actions = session.handle_event(event);

    if !actions.is_empty() {
        let batch = ActionBatch::new(session.connection(), actions);
        if let Err(e) = sink.deliver(batch).await {
            warn!(connection = %session.connection(), error = %e, "Failed to deliver actions");
        }
    }

    !last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::sink::ChannelSink;
    use edgefw_types::MacAddress;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    const EDGE: DatapathId = DatapathId::new(4);
    const CORE: DatapathId = DatapathId::new(1);

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, last])
    }

    fn context() -> SessionContext {
        let rules = RuleStore::new(
            "test",
            vec![Rule::IpPair {
                left: Ipv4Addr::new(10, 0, 0, 5),
                right: Ipv4Addr::new(10, 0, 0, 9),
                restricted_port: Some("80".to_string()),
            }],
        );
        SessionContext::new(rules, EdgeSwitchSet::new(["00-00-00-00-00-04"]))
    }

    fn packet_in(conn: u64, port: u16, src: u8, dst: u8) -> SwitchEvent {
        SwitchEvent::PacketIn {
            connection: ConnectionId::new(conn),
            in_port: PortNo::new(port),
            packet: ParsedPacket::new(mac(src), mac(dst), vec![src, dst]),
        }
    }

    #[test]
    fn test_edge_connection_up_installs_policy() {
        let mut session = SwitchSession::new(ConnectionId::new(1), &context());
        let actions = session.handle_event(SwitchEvent::ConnectionUp {
            connection: ConnectionId::new(1),
            dpid: EDGE,
        });

        assert_eq!(actions.len(), 2);
        assert_eq!(session.dpid(), Some(EDGE));
        assert_eq!(session.stats().policy_installs, 2);
    }

    #[test]
    fn test_core_connection_up_installs_nothing() {
        let mut session = SwitchSession::new(ConnectionId::new(1), &context());
        assert!(session.on_connection_up(CORE).is_empty());
        assert_eq!(session.stats().policy_installs, 0);
    }

    #[test]
    fn test_packet_in_counts() {
        let mut session = SwitchSession::new(ConnectionId::new(1), &context());

        assert_eq!(session.handle_event(packet_in(1, 1, 1, 2)).len(), 1);
        assert_eq!(session.handle_event(packet_in(1, 2, 2, 1)).len(), 2);
        let incomplete = session.on_packet_in(PortNo::new(3), ParsedPacket::incomplete(vec![]));
        assert!(incomplete.is_empty());

        assert_eq!(
            session.stats(),
            SessionStats {
                packets_in: 3,
                incomplete_packets: 1,
                floods: 1,
                flow_installs: 2,
                policy_installs: 0,
            }
        );
        assert_eq!(session.learning_table().len(), 2);
    }

    #[test]
    fn test_ignores_other_connections() {
        let mut session = SwitchSession::new(ConnectionId::new(1), &context());
        assert!(session.handle_event(packet_in(2, 1, 1, 2)).is_empty());
        assert!(session.learning_table().is_empty());
        assert_eq!(session.stats().packets_in, 0);
    }

    #[test]
    fn test_context_from_config() {
        let mut config = EdgefwConfig::default();
        config.forwarding.flood_mode = FloodMode::AllPorts;
        config.policy.port_restriction = PortRestriction::Off;

        let ctx = SessionContext::from_config(&config, RuleStore::empty());
        assert_eq!(ctx.flood_mode, FloodMode::AllPorts);
        assert_eq!(ctx.port_restriction, PortRestriction::Off);
        assert_eq!(ctx.edge_switches.len(), 4);
        assert!(ctx.rules.is_empty());
    }

    #[tokio::test]
    async fn test_actor_delivers_batches_in_order() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (sink, mut batches) = ChannelSink::new(8);
        let session = SwitchSession::new(ConnectionId::new(1), &context());
        let task = tokio::spawn(run_session(
            session,
            event_rx,
            Arc::new(sink),
            CancellationToken::new(),
        ));

        event_tx
            .send(SwitchEvent::ConnectionUp {
                connection: ConnectionId::new(1),
                dpid: EDGE,
            })
            .await
            .unwrap();
        event_tx.send(packet_in(1, 1, 1, 2)).await.unwrap();
        event_tx
            .send(SwitchEvent::ConnectionDown {
                connection: ConnectionId::new(1),
            })
            .await
            .unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats.policy_installs, 2);
        assert_eq!(stats.floods, 1);

        let first = batches.recv().await.unwrap();
        assert_eq!(first.installs().count(), 2);
        let second = batches.recv().await.unwrap();
        assert!(second.actions[0].is_flood());
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_actor_drains_queue_on_cancel() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (sink, mut batches) = ChannelSink::new(8);
        let cancel = CancellationToken::new();

        event_tx.send(packet_in(1, 1, 1, 2)).await.unwrap();
        event_tx.send(packet_in(1, 2, 3, 4)).await.unwrap();
        cancel.cancel();

        let session = SwitchSession::new(ConnectionId::new(1), &context());
        let stats = run_session(session, event_rx, Arc::new(sink), cancel).await;

        assert_eq!(stats.packets_in, 2);
        assert!(batches.recv().await.is_some());
        assert!(batches.recv().await.is_some());
    }
}
