//! Session registry: routes events to one actor per switch connection.

use crate::event::SwitchEvent;
use crate::session::{run_session, SessionContext, SessionStats, SwitchSession};
use crate::sink::ActionSink;
use edgefw_types::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the session actors and the channel into each of them.
///
/// Events for one connection are forwarded in arrival order; events for
/// different connections are handled concurrently.
pub struct Controller {
    ctx: Arc<SessionContext>,
    sink: Arc<dyn ActionSink>,
    queue_depth: usize,
    sessions: HashMap<ConnectionId, mpsc::Sender<SwitchEvent>>,
    tasks: JoinSet<(ConnectionId, SessionStats)>,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(ctx: SessionContext, sink: Arc<dyn ActionSink>, queue_depth: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sink,
            queue_depth: queue_depth.max(1),
            sessions: HashMap::new(),
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Number of connections with a live session.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, connection: ConnectionId) -> bool {
        self.sessions.contains_key(&connection)
    }

    /// Routes one event.
    ///
    /// A connection-up starts a session, replacing any previous session on
    /// the same connection id. A connection-down is forwarded and then ends
    /// the session. Packet-ins for unknown connections are dropped.
    pub async fn dispatch(&mut self, event: SwitchEvent) {
        self.reap_finished();
        let connection = event.connection();

        match event {
            SwitchEvent::ConnectionUp { .. } => {
                if self.sessions.remove(&connection).is_some() {
                    warn!(connection = %connection, "Replacing existing session");
                }
                let tx = self.spawn_session(connection);
                self.forward(connection, tx, event).await;
            }
            SwitchEvent::PacketIn { .. } => match self.sessions.get(&connection) {
                Some(tx) => {
                    let tx = tx.clone();
                    self.forward(connection, tx, event).await;
                }
                None => {
                    warn!(connection = %connection, "Packet-in for unknown connection");
                }
            },
            SwitchEvent::ConnectionDown { .. } => match self.sessions.remove(&connection) {
                Some(tx) => {
                    if tx.send(event).await.is_err() {
                        debug!(connection = %connection, "Session already stopped");
                    }
                }
                None => {
                    warn!(connection = %connection, "Connection-down for unknown connection");
                }
            },
        }
    }

    /// Dispatches events from `rx` until it closes or `cancel` fires, then
    /// shuts every session down.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<SwitchEvent>,
        cancel: CancellationToken,
    ) -> Vec<(ConnectionId, SessionStats)> {
        info!("Controller started");

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },
                () = cancel.cancelled() => {
                    info!("Controller cancelled");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Stops every session after it drains its queue and waits for the
    /// actors to exit. Returns the final statistics of every session that
    /// has not been reaped yet.
    pub async fn shutdown(mut self) -> Vec<(ConnectionId, SessionStats)> {
        self.sessions.clear();
        self.cancel.cancel();

        let mut finished = Vec::new();
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(stats) => finished.push(stats),
                Err(e) => warn!(error = %e, "Session task failed"),
            }
        }
        info!(sessions = finished.len(), "Controller stopped");
        finished
    }

    fn spawn_session(&mut self, connection: ConnectionId) -> mpsc::Sender<SwitchEvent> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let session = SwitchSession::new(connection, &self.ctx);
        let sink = self.sink.clone();
        let cancel = self.cancel.child_token();

        self.tasks.spawn(async move {
            let stats = run_session(session, rx, sink, cancel).await;
            (connection, stats)
        });
        self.sessions.insert(connection, tx.clone());
        debug!(connection = %connection, sessions = self.sessions.len(), "Session spawned");
        tx
    }

    async fn forward(
        &mut self,
        connection: ConnectionId,
        tx: mpsc::Sender<SwitchEvent>,
        event: SwitchEvent,
    ) {
        if tx.send(event).await.is_err() {
            warn!(connection = %connection, "Session stopped unexpectedly");
            self.sessions.remove(&connection);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(res) = self.tasks.try_join_next() {
            if let Err(e) = res {
                warn!(error = %e, "Session task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeSwitchSet;
    use crate::event::ParsedPacket;
    use crate::rules::{Rule, RuleStore};
    use crate::sink::ChannelSink;
    use edgefw_types::{DatapathId, MacAddress, PortNo};
    use pretty_assertions::assert_eq;

    fn controller() -> (Controller, mpsc::Receiver<crate::flow::ActionBatch>) {
        let rules = RuleStore::new(
            "test",
            vec![Rule::MacPair {
                left: MacAddress::new([0, 0, 0, 0, 0, 1]),
                right: MacAddress::new([0, 0, 0, 0, 0, 2]),
            }],
        );
        let ctx = SessionContext::new(rules, EdgeSwitchSet::new(["00-00-00-00-00-04"]));
        let (sink, batches) = ChannelSink::new(16);
        (Controller::new(ctx, Arc::new(sink), 4), batches)
    }

    fn up(conn: u64, dpid: u64) -> SwitchEvent {
        SwitchEvent::ConnectionUp {
            connection: ConnectionId::new(conn),
            dpid: DatapathId::new(dpid),
        }
    }

    fn packet_in(conn: u64) -> SwitchEvent {
        SwitchEvent::PacketIn {
            connection: ConnectionId::new(conn),
            in_port: PortNo::new(1),
            packet: ParsedPacket::new(
                MacAddress::new([0, 0, 0, 0, 0, 1]),
                MacAddress::new([0, 0, 0, 0, 0, 9]),
                vec![],
            ),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (mut controller, _batches) = controller();

        controller.dispatch(up(1, 4)).await;
        controller.dispatch(up(2, 1)).await;
        assert_eq!(controller.session_count(), 2);

        controller
            .dispatch(SwitchEvent::ConnectionDown {
                connection: ConnectionId::new(1),
            })
            .await;
        assert!(!controller.has_session(ConnectionId::new(1)));
        assert!(controller.has_session(ConnectionId::new(2)));

        let stats = controller.shutdown().await;
        assert_eq!(stats.len(), 2);
    }

    #[tokio::test]
    async fn test_packet_in_without_session_is_dropped() {
        let (mut controller, mut batches) = controller();
        controller.dispatch(packet_in(7)).await;
        assert_eq!(controller.session_count(), 0);

        controller.shutdown().await;
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_policy_batch_precedes_packet_handling() {
        let (mut controller, mut batches) = controller();
        controller.dispatch(up(1, 4)).await;
        controller.dispatch(packet_in(1)).await;
        controller.shutdown().await;

        let first = batches.recv().await.unwrap();
        assert_eq!(first.installs().count(), 2);
        assert!(first.installs().all(|i| i.actions.is_empty()));

        let second = batches.recv().await.unwrap();
        assert!(second.actions[0].is_flood());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let (mut controller, _batches) = controller();
        controller.dispatch(up(1, 4)).await;
        controller.dispatch(packet_in(1)).await;
        controller.dispatch(up(1, 4)).await;
        assert_eq!(controller.session_count(), 1);

        let mut stats = controller.shutdown().await;
        stats.sort_by_key(|(_, s)| s.packets_in);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].1.packets_in, 0);
        assert_eq!(stats[1].1.packets_in, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (controller, _batches) = controller();
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(controller.run(rx, cancel.clone()));

        tx.send(up(1, 1)).await.unwrap();
        cancel.cancel();

        let stats = task.await.unwrap();
        assert!(stats.len() <= 1);
    }
}
