//! Delivery of action batches to the protocol driver.

use crate::error::SinkError;
use crate::flow::ActionBatch;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

/// Where sessions hand off the actions they produce.
///
/// Implementations are shared by every session actor, so they must be safe
/// to call concurrently. A batch is delivered whole or not at all.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn deliver(&self, batch: ActionBatch) -> Result<(), SinkError>;
}

/// Forwards batches into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ActionBatch>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the driver reads batches from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ActionBatch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ActionSink for ChannelSink {
    async fn deliver(&self, batch: ActionBatch) -> Result<(), SinkError> {
        self.tx.send(batch).await.map_err(|_| SinkError::Closed)
    }
}

/// Writes each batch as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ActionSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&self, batch: ActionBatch) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&batch)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::SwitchAction;
    use edgefw_types::{ConnectionId, PortNo};
    use pretty_assertions::assert_eq;

    fn batch() -> ActionBatch {
        ActionBatch::new(
            ConnectionId::new(3),
            vec![SwitchAction::Flood {
                exclude_port: Some(PortNo::new(1)),
                payload: vec![],
            }],
        )
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.deliver(batch()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), batch());
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        assert!(matches!(
            sink.deliver(batch()).await,
            Err(SinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.deliver(batch()).await.unwrap();
        sink.deliver(batch()).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let decoded: ActionBatch = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(decoded, batch());
        assert_eq!(
            lines[0],
            r#"{"connection":3,"actions":[{"type":"flood","exclude_port":1,"payload":[]}]}"#
        );
    }
}
