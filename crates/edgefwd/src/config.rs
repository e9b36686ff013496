//! Configuration file support for edgefwd.
//!
//! Loads and validates the daemon configuration from a TOML file.
//! Default location: /etc/edgefw/edgefwd.toml

use crate::edge::EdgeSwitchSet;
use crate::error::{ConfigError, LoadError};
use crate::forwarding::FloodMode;
use crate::policy::{PortRestriction, RuleAction};
use crate::rules::RuleStore;
use edgefw_types::DatapathId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/edgefw/edgefwd.toml";

/// Default rule file location.
pub const DEFAULT_RULES_PATH: &str = "/etc/edgefw/firewall.csv";

/// Rule source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Path to the comma-separated rule file
    #[serde(default = "default_rules_path")]
    pub path: PathBuf,

    /// Keep running with no rules when the rule file fails to load
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
}

/// Edge switch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Datapath ids (dashed form) of the switches that enforce policy
    #[serde(default = "default_edge_switches")]
    pub switches: Vec<String>,
}

/// Learning bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingConfig {
    #[serde(default)]
    pub flood_mode: FloodMode,
}

/// Policy flow entry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rule_action: RuleAction,

    #[serde(default)]
    pub port_restriction: PortRestriction,
}

/// Event handling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of each per-connection event queue
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

/// Complete edgefwd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgefwConfig {
    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub edge: EdgeConfig,

    #[serde(default)]
    pub forwarding: ForwardingConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_PATH)
}

fn default_fail_open() -> bool {
    true
}

fn default_edge_switches() -> Vec<String> {
    (4..=7u64)
        .map(|dpid| DatapathId::new(dpid).to_string())
        .collect()
}

fn default_event_queue_depth() -> usize {
    1024
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
            fail_open: default_fail_open(),
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            switches: default_edge_switches(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

impl EdgefwConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Load configuration from file, falling back to defaults if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                warn!(
                    path = %path.as_ref().display(),
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse configuration text; `origin` names the source in errors
    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rules.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("rules.path", "must not be empty"));
        }

        if self.runtime.event_queue_depth == 0 {
            return Err(ConfigError::invalid(
                "runtime.event_queue_depth",
                "must be > 0",
            ));
        }

        // Edge ids are compared as strings, so anything that is not already
        // in rendered form could never match a connecting switch.
        for switch in &self.edge.switches {
            let canonical = switch
                .parse::<DatapathId>()
                .map(|dpid| dpid.to_string())
                .map_err(|e| ConfigError::invalid("edge.switches", e.to_string()))?;
            if canonical != *switch {
                return Err(ConfigError::invalid(
                    "edge.switches",
                    format!("'{switch}' must be written as '{canonical}'"),
                ));
            }
        }

        Ok(())
    }

    /// The configured edge switches as a lookup set
    pub fn edge_switch_set(&self) -> EdgeSwitchSet {
        EdgeSwitchSet::new(self.edge.switches.iter().cloned())
    }

    /// Load the rule file for serving traffic.
    ///
    /// With `rules.fail_open` a load error is logged and an empty store is
    /// returned, so switches still get plain learning-bridge forwarding.
    /// Otherwise the error is returned.
    pub fn load_rules(&self) -> Result<RuleStore, LoadError> {
        match RuleStore::load(&self.rules.path) {
            Ok(rules) => Ok(rules),
            Err(e) if self.rules.fail_open => {
                warn!(error = %e, "Rules not loaded, continuing with no firewall rules");
                Ok(RuleStore::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Load the rule file strictly, ignoring `rules.fail_open`
    pub fn check_rules(&self) -> Result<RuleStore, LoadError> {
        RuleStore::load(&self.rules.path)
    }
}
