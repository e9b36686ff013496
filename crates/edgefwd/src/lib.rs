//! Edge firewall and learning bridge for OpenFlow switches.
//!
//! `edgefwd` makes the per-switch decisions of a small SDN controller. It
//! learns which port each station lives behind, floods or installs
//! bidirectional flows for data-plane traffic, and pushes a CSV-defined
//! rule set to designated edge switches when they connect. Talking
//! OpenFlow on the wire is left to an external driver: events come in as
//! [`SwitchEvent`]s and decisions go out as [`ActionBatch`]es.
//!
//! # Architecture
//!
//! ```text
//!  driver ──SwitchEvent──▶ Controller ──mpsc──▶ run_session (one per connection)
//!                                                 │  SwitchSession
//!                                                 │   ├─ LearningTable
//!                                                 │   ├─ ForwardingEngine
//!                                                 │   └─ PolicyInstaller ◀─ RuleStore, EdgeSwitchSet
//!  driver ◀──ActionBatch── ActionSink ◀────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod edge;
pub mod error;
pub mod event;
pub mod flow;
pub mod forwarding;
pub mod learning;
pub mod policy;
pub mod rules;
pub mod session;
pub mod sink;

pub use bridge::{run_bridge, BridgeStats};
pub use config::EdgefwConfig;
pub use controller::Controller;
pub use edge::{is_edge, EdgeSwitchSet};
pub use error::{ConfigError, EdgefwError, ForwardingError, LoadError, Result, SinkError};
pub use event::{ParsedPacket, SwitchEvent};
pub use flow::{ActionBatch, FlowAction, FlowMatch, InstallFlow, SwitchAction};
pub use forwarding::{FloodMode, ForwardingEngine};
pub use learning::{LearnOutcome, LearningStats, LearningTable};
pub use policy::{PolicyInstaller, PortRestriction, RuleAction};
pub use rules::{Rule, RuleKind, RuleStore};
pub use session::{run_session, SessionContext, SessionStats, SwitchSession};
pub use sink::{ActionSink, ChannelSink, JsonLinesSink};

pub use edgefw_types::{ConnectionId, DatapathId, MacAddress, PortNo};
