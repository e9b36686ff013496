//! JSON lines in, JSON lines out.

mod common;

use common::*;
use edgefwd::{
    run_bridge, ActionBatch, Controller, EdgeSwitchSet, JsonLinesSink, RuleStore, SessionContext,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_bridge_round_trip() {
    let rule_file = write_rule_file("kind,src,dst,port\nip,10.0.0.5,10.0.0.9,80\n");
    let rules = RuleStore::load(rule_file.path()).unwrap();
    let ctx = SessionContext::new(rules, EdgeSwitchSet::new([EDGE_SWITCH]));

    let (out_writer, out_reader) = tokio::io::duplex(64 * 1024);
    let sink = Arc::new(JsonLinesSink::new(out_writer));
    let mut controller = Controller::new(ctx, sink, 8);

    let input = [
        r#"{"type":"connection_up","connection":7,"dpid":4}"#,
        r#"{"type":"packet_in","connection":7,"in_port":1,"packet":{"src":"00:00:00:00:00:01","dst":"00:00:00:00:00:02","data":[1]}}"#,
        r#"{"type":"packet_in","connection":7,"in_port":2,"packet":{"parsed":false,"data":[]}}"#,
        r#"{"type":"packet_in","connection":7,"in_port":2,"packet":{"src":"00:00:00:00:00:02","dst":"00:00:00:00:00:01","data":[2]}}"#,
        r#"{"type":"connection_down","connection":7}"#,
    ]
    .join("\n");

    let (mut in_writer, in_reader) = tokio::io::duplex(64 * 1024);
    in_writer.write_all(input.as_bytes()).await.unwrap();
    drop(in_writer);

    let stats = run_bridge(BufReader::new(in_reader), &mut controller, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.events_dispatched, 5);
    assert_eq!(stats.decode_errors, 0);
    controller.shutdown().await;

    let mut lines = BufReader::new(out_reader).lines();
    let mut batches = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        batches.push(serde_json::from_str::<ActionBatch>(&line).unwrap());
    }

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].installs().count(), 2);
    assert_eq!(batches[0].installs().next().unwrap().flow_match.tp_dst, Some(80));
    assert!(batches[1].actions[0].is_flood());
    assert_eq!(batches[2].installs().count(), 2);
}

#[test]
fn test_action_wire_format() {
    let batch: ActionBatch = serde_json::from_str(
        r#"{"connection":1,"actions":[
            {"type":"install_flow","match":{"dl_src":"00:00:00:00:00:01","dl_dst":"00:00:00:00:00:02"},
             "actions":[{"type":"output","port":2}],"payload":[9]}
        ]}"#,
    )
    .unwrap();

    let install = batch.installs().next().unwrap().clone();
    assert_eq!(install.flow_match.dl_src, Some(mac(1)));

    let (install, forward) = install.split_forward();
    assert_eq!(install.payload, None);
    assert_eq!(
        serde_json::to_value(forward.unwrap()).unwrap(),
        serde_json::json!({"type": "forward", "output_port": 2, "payload": [9]})
    );
}
