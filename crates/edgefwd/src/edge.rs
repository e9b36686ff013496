//! Edge switch classification.
//!
//! Only edge switches receive the static firewall rules; interior switches
//! are left unrestricted. Membership is an exact match on the switch's
//! string identity, so configured ids must use the same dashed form that
//! [`edgefw_types::DatapathId`] renders.

use std::collections::HashSet;
use tracing::info;

/// The set of switch identities that enforce policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSwitchSet {
    switches: HashSet<String>,
}

impl EdgeSwitchSet {
    pub fn new<I, S>(switches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            switches: switches.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `switch_id` is a policy enforcement point.
    pub fn is_edge(&self, switch_id: &str) -> bool {
        info!(switch = switch_id, "Checking if switch is an edge switch");
        let edge = self.switches.contains(switch_id);
        if edge {
            info!(
                switch = switch_id,
                "Switch IS an edge switch, installing firewall rules"
            );
        } else {
            info!(
                switch = switch_id,
                "Switch is NOT an edge switch, not installing firewall rules"
            );
        }
        edge
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}

/// Free-function form of [`EdgeSwitchSet::is_edge`].
pub fn is_edge(switch_id: &str, edge_set: &EdgeSwitchSet) -> bool {
    edge_set.is_edge(switch_id)
}
