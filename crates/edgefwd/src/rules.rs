//! Static firewall rule store.
//!
//! Rules come from a comma-separated file whose first row is a header:
//!
//! ```text
//! type,src,dst,port
//! mac,00:00:00:00:00:01,00:00:00:00:00:02
//! ip,10.0.0.1,10.0.0.2,80
//! ```
//!
//! Each data row is one bidirectional rule. Rows keep file order and are
//! never deduplicated; overlapping rules are all installed and the switch's
//! flow table decides between them.
//!
//! Fields are split on every comma. Quoting is not supported, so a field
//! cannot itself contain a comma.

use crate::error::LoadError;
use edgefw_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info};

/// Kind tag of a rule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// `mac` rows: a pair of link-layer addresses.
    MacPair,
    /// `ip` rows: a pair of IPv4 addresses with an optional port.
    IpPair,
}

impl RuleKind {
    /// The tag used in the first column of the rule file.
    pub const fn tag(&self) -> &'static str {
        match self {
            RuleKind::MacPair => "mac",
            RuleKind::IpPair => "ip",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mac" => Some(RuleKind::MacPair),
            "ip" => Some(RuleKind::IpPair),
            _ => None,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A normalized firewall rule. `left` and `right` are unordered: the rule
/// covers traffic in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    MacPair {
        left: MacAddress,
        right: MacAddress,
    },
    IpPair {
        left: Ipv4Addr,
        right: Ipv4Addr,
        /// Optional fourth column, kept as written. How it narrows the
        /// match is decided by [`PortRestriction`](crate::policy::PortRestriction).
        restricted_port: Option<String>,
    },
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::MacPair { .. } => RuleKind::MacPair,
            Rule::IpPair { .. } => RuleKind::IpPair,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::MacPair { left, right } => write!(f, "mac {left} <-> {right}"),
            Rule::IpPair {
                left,
                right,
                restricted_port: Some(port),
            } => write!(f, "ip {left} <-> {right} port {port}"),
            Rule::IpPair {
                left,
                right,
                restricted_port: None,
            } => write!(f, "ip {left} <-> {right}"),
        }
    }
}

/// The ordered, read-only rule set shared by every switch session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleStore {
    origin: String,
    rules: Vec<Rule>,
}

impl RuleStore {
    /// Creates a store from already-normalized rules.
    pub fn new(origin: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            origin: origin.into(),
            rules,
        }
    }

    /// An empty store, used when the daemon fails open after a load error.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads rules from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let origin = path.display().to_string();

        let file = File::open(path).map_err(|source| LoadError::Open {
            origin: origin.clone(),
            source,
        })?;

        Self::parse(BufReader::new(file), origin)
    }

    /// Parses rules from any buffered reader. `origin` names the source in
    /// log records and errors.
    pub fn parse<R: BufRead>(reader: R, origin: impl Into<String>) -> Result<Self, LoadError> {
        let origin = origin.into();
        let mut rules = Vec::new();

        // Line 1 is the header and is discarded unread.
        for (idx, line) in reader.lines().enumerate().skip(1) {
            let line_no = idx + 1;
            let line = line.map_err(|source| match source.kind() {
                io::ErrorKind::InvalidData => LoadError::MalformedRow {
                    origin: origin.clone(),
                    line: line_no,
                    reason: "row is not valid UTF-8".to_string(),
                },
                _ => LoadError::Read {
                    origin: origin.clone(),
                    source,
                },
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let rule = parse_row(&line, &origin, line_no)?;
            debug!(origin = %origin, line = line_no, rule = %rule, "Parsed firewall rule");
            rules.push(rule);
        }

        info!(
            origin = %origin,
            rules = rules.len(),
            "Loaded firewall rules"
        );

        Ok(Self { origin, rules })
    }

    /// Where the rules were loaded from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Rules in file order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_row(line: &str, origin: &str, line_no: usize) -> Result<Rule, LoadError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let malformed = |reason: String| LoadError::MalformedRow {
        origin: origin.to_string(),
        line: line_no,
        reason,
    };

    let kind = RuleKind::from_tag(fields[0]).ok_or_else(|| LoadError::UnknownRuleKind {
        origin: origin.to_string(),
        line: line_no,
        tag: fields[0].to_string(),
    })?;

    match kind {
        RuleKind::MacPair => {
            if fields.len() != 3 {
                return Err(malformed(format!(
                    "mac rule expects 3 columns, found {}",
                    fields.len()
                )));
            }
            let left = fields[1]
                .parse::<MacAddress>()
                .map_err(|e| malformed(e.to_string()))?;
            let right = fields[2]
                .parse::<MacAddress>()
                .map_err(|e| malformed(e.to_string()))?;
            Ok(Rule::MacPair { left, right })
        }
        RuleKind::IpPair => {
            if !(3..=4).contains(&fields.len()) {
                return Err(malformed(format!(
                    "ip rule expects 3 or 4 columns, found {}",
                    fields.len()
                )));
            }
            let parse_ip = |s: &str| {
                s.parse::<Ipv4Addr>()
                    .map_err(|_| malformed(format!("invalid IPv4 address: {s}")))
            };
            let left = parse_ip(fields[1])?;
            let right = parse_ip(fields[2])?;
            let restricted_port = match fields.get(3) {
                None | Some(&"") => None,
                Some(port) => Some(port.to_string()),
            };
            Ok(Rule::IpPair {
                left,
                right,
                restricted_port,
            })
        }
    }
}
