//! Static firewall rule installation on edge switches.
//!
//! When an edge switch connects, every rule in the store is pushed as two
//! flow entries, one per direction, in file order. All rules are installed;
//! there is no first-match precedence between them.

use crate::edge::EdgeSwitchSet;
use crate::flow::{FlowAction, FlowMatch, InstallFlow};
use crate::rules::{Rule, RuleStore};
use edgefw_types::PortNo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Port treated as restricted under [`PortRestriction::WellKnown`].
pub const WELL_KNOWN_RESTRICTED_PORT: u16 = 80;

const WELL_KNOWN_RESTRICTED_PORT_TEXT: &str = "80";

/// Actions attached to policy flow entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    /// No actions: the switch applies its default for action-less entries.
    #[default]
    MatchOnly,
    /// Output to `NORMAL`, explicitly allowing matched traffic.
    Normal,
}

/// When an `ip` rule's port column narrows the match to a TCP port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortRestriction {
    /// Only when the port is 80.
    #[default]
    WellKnown,
    /// Whenever a port is given.
    Any,
    /// Never; `ip` rules match on addresses only.
    Off,
}

impl PortRestriction {
    /// The port to match on for a rule's port column, if any.
    ///
    /// `WellKnown` compares the column text against `"80"` exactly, so
    /// `080` or `+80` do not restrict. `Any` restricts to any column that
    /// parses as a port number and ignores the rest.
    pub fn effective_port(&self, port_column: Option<&str>) -> Option<u16> {
        match (self, port_column) {
            (PortRestriction::WellKnown, Some(WELL_KNOWN_RESTRICTED_PORT_TEXT)) => {
                Some(WELL_KNOWN_RESTRICTED_PORT)
            }
            (PortRestriction::Any, Some(text)) => match text.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!(port = text, "Ignoring non-numeric rule port");
                    None
                }
            },
            _ => None,
        }
    }
}

/// Pushes the rule store to edge switches at connection time.
#[derive(Debug, Clone)]
pub struct PolicyInstaller {
    rules: Arc<RuleStore>,
    edge_switches: Arc<EdgeSwitchSet>,
    rule_action: RuleAction,
    port_restriction: PortRestriction,
}

impl PolicyInstaller {
    pub fn new(rules: Arc<RuleStore>, edge_switches: Arc<EdgeSwitchSet>) -> Self {
        Self {
            rules,
            edge_switches,
            rule_action: RuleAction::default(),
            port_restriction: PortRestriction::default(),
        }
    }

    pub fn with_rule_action(mut self, rule_action: RuleAction) -> Self {
        self.rule_action = rule_action;
        self
    }

    pub fn with_port_restriction(mut self, port_restriction: PortRestriction) -> Self {
        self.port_restriction = port_restriction;
        self
    }

    /// Flow entries to install on `switch_id`; empty for non-edge switches.
    pub fn on_connection_established(&self, switch_id: &str) -> Vec<InstallFlow> {
        if !self.edge_switches.is_edge(switch_id) {
            return Vec::new();
        }

        let installs: Vec<InstallFlow> = self
            .rules
            .iter()
            .flat_map(|rule| self.installs_for(rule))
            .collect();

        info!(
            switch = switch_id,
            rules = self.rules.len(),
            flows = installs.len(),
            "Firewall updated"
        );

        installs
    }

    fn installs_for(&self, rule: &Rule) -> [InstallFlow; 2] {
        let (there, back) = match rule {
            Rule::MacPair { left, right } => {
                (FlowMatch::l2(*left, *right), FlowMatch::l2(*right, *left))
            }
            Rule::IpPair {
                left,
                right,
                restricted_port,
            } => {
                let there = FlowMatch::ipv4(*left, *right);
                let back = FlowMatch::ipv4(*right, *left);
                match self
                    .port_restriction
                    .effective_port(restricted_port.as_deref())
                {
                    Some(port) => (there.with_tcp_dst(port), back.with_tcp_dst(port)),
                    None => (there, back),
                }
            }
        };

        debug!(rule = %rule, "Installing {} and {}", there, back);

        [self.install(there), self.install(back)]
    }

    fn install(&self, flow_match: FlowMatch) -> InstallFlow {
        let install = InstallFlow::new(flow_match);
        match self.rule_action {
            RuleAction::MatchOnly => install,
            RuleAction::Normal => install.with_action(FlowAction::Output(PortNo::NORMAL)),
        }
    }
}
