//! MAC learning table for one switch connection.
//!
//! Entries are upserted on every observed frame and never expire; a station
//! that moves is simply re-learned on its new port.

use edgefw_types::{MacAddress, PortNo};
use std::collections::HashMap;
use tracing::debug;

/// What a call to [`LearningTable::learn`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    /// First time this address was seen.
    New,
    /// Address re-seen on the port already recorded.
    Refreshed,
    /// Address now seen on a different port.
    Moved { previous: PortNo },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningStats {
    pub entries_learned: u64,
    pub entries_moved: u64,
    pub entries_refreshed: u64,
}

/// Source address to ingress port associations for a single connection.
#[derive(Debug, Default)]
pub struct LearningTable {
    entries: HashMap<MacAddress, PortNo>,
    stats: LearningStats,
}

impl LearningTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `src` was seen arriving on `port`.
    pub fn learn(&mut self, src: MacAddress, port: PortNo) -> LearnOutcome {
        match self.entries.insert(src, port) {
            None => {
                self.stats.entries_learned += 1;
                LearnOutcome::New
            }
            Some(previous) if previous == port => {
                self.stats.entries_refreshed += 1;
                LearnOutcome::Refreshed
            }
            Some(previous) => {
                self.stats.entries_moved += 1;
                debug!(mac = %src, from = %previous, to = %port, "Station moved");
                LearnOutcome::Moved { previous }
            }
        }
    }

    /// Port on which `dst` was last seen, if known.
    pub fn lookup(&self, dst: &MacAddress) -> Option<PortNo> {
        self.entries.get(dst).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LearningStats {
        self.stats
    }
}
