//! Line-oriented JSON driver: events in on a reader, one per line.
//!
//! This is how `edgefwd` is wired to a protocol driver running as a separate
//! process. Each input line is a [`SwitchEvent`]:
//!
//! ```text
//! {"type":"connection_up","connection":1,"dpid":4}
//! {"type":"packet_in","connection":1,"in_port":2,"packet":{"src":"00:00:00:00:00:01","dst":"00:00:00:00:00:02"}}
//! {"type":"connection_down","connection":1}
//! ```
//!
//! Batches flow back through whatever [`ActionSink`](crate::sink::ActionSink)
//! the controller was built with, normally a
//! [`JsonLinesSink`](crate::sink::JsonLinesSink) on stdout.

use crate::controller::Controller;
use crate::error::{EdgefwError, Result};
use crate::event::SwitchEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one bridge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub lines_read: u64,
    pub events_dispatched: u64,
    pub decode_errors: u64,
}

/// Feeds events decoded from `reader` into `controller` until end of input
/// or cancellation.
///
/// Undecodable lines are logged and skipped. A read error ends the bridge
/// with [`EdgefwError::EventStream`].
pub async fn run_bridge<R>(
    reader: R,
    controller: &mut Controller,
    cancel: CancellationToken,
) -> Result<BridgeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = BridgeStats::default();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(EdgefwError::EventStream)?,
            () = cancel.cancelled() => {
                debug!("Bridge cancelled");
                break;
            }
        };
        let Some(line) = line else {
            debug!("End of event stream");
            break;
        };

        stats.lines_read += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<SwitchEvent>(line) {
            Ok(event) => {
                controller.dispatch(event).await;
                stats.events_dispatched += 1;
            }
            Err(e) => {
                stats.decode_errors += 1;
                warn!(line = stats.lines_read, error = %e, "Skipping undecodable event");
            }
        }
    }

    info!(
        lines_read = stats.lines_read,
        events_dispatched = stats.events_dispatched,
        decode_errors = stats.decode_errors,
        "Bridge stopped"
    );
    Ok(stats)
}
