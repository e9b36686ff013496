//! Error types for edgefwd.
//!
//! Each concern has its own `thiserror` enum; [`EdgefwError`] wraps them for
//! code paths that cross concerns (startup, the bridge).

use edgefw_types::{ConnectionId, PortNo};
use std::io;
use thiserror::Error;

/// Result type alias for edgefwd operations.
pub type Result<T> = std::result::Result<T, EdgefwError>;

/// Failure to load the static rule set.
///
/// Any malformed row aborts the whole load; a partially loaded rule set is
/// never returned.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The rule file could not be opened.
    #[error("Failed to open rule file '{origin}': {source}")]
    Open {
        origin: String,
        #[source]
        source: io::Error,
    },

    /// Reading from the rule source failed part way through.
    #[error("Failed to read rule source '{origin}': {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },

    /// A row's kind tag is neither `mac` nor `ip`.
    #[error("{origin}:{line}: unknown rule kind '{tag}' (expected 'mac' or 'ip')")]
    UnknownRuleKind {
        origin: String,
        line: usize,
        tag: String,
    },

    /// A row has the wrong number of columns or an unparsable field.
    #[error("{origin}:{line}: malformed rule row: {reason}")]
    MalformedRow {
        origin: String,
        line: usize,
        reason: String,
    },
}

impl LoadError {
    /// Line number of the offending row, for row-level errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoadError::UnknownRuleKind { line, .. } | LoadError::MalformedRow { line, .. } => {
                Some(*line)
            }
            LoadError::Open { .. } | LoadError::Read { .. } => None,
        }
    }
}

/// Failure to load or validate the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Packet-in handling failures. These are recovered locally: the packet is
/// dropped and no action is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingError {
    #[error("Ignoring incomplete packet from {connection} on port {in_port}")]
    IncompletePacket {
        connection: ConnectionId,
        in_port: PortNo,
    },
}

/// Failure delivering an action batch to the protocol driver.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Action sink is closed")]
    Closed,

    #[error("Failed to encode action batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write action batch: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error for edgefwd.
#[derive(Debug, Error)]
pub enum EdgefwError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Forwarding(#[from] ForwardingError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Reading the driver event stream failed.
    #[error("Event stream error: {0}")]
    EventStream(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_rule_kind_display() {
        let err = LoadError::UnknownRuleKind {
            origin: "firewall.csv".to_string(),
            line: 3,
            tag: "foo".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "firewall.csv:3: unknown rule kind 'foo' (expected 'mac' or 'ip')"
        );
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_open_error_has_no_line() {
        let err = LoadError::Open {
            origin: "/missing.csv".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/missing.csv"));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_incomplete_packet_display() {
        let err = ForwardingError::IncompletePacket {
            connection: ConnectionId::new(1),
            in_port: PortNo::new(2),
        };
        assert_eq!(
            err.to_string(),
            "Ignoring incomplete packet from conn#1 on port 2"
        );
    }

    #[test]
    fn test_config_error_invalid() {
        let err = ConfigError::invalid("runtime.event_queue_depth", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for runtime.event_queue_depth: must be > 0"
        );
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: EdgefwError = SinkError::Closed.into();
        assert!(matches!(err, EdgefwError::Sink(SinkError::Closed)));
        assert_eq!(err.to_string(), "Action sink is closed");
    }
}
