//! Topic naming for live status fan-out.
//!
//! A topic is either `service:<id>` or `environment:<id>`.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Broadcast channel a subscriber connection can join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Service(Uuid),
    Environment(Uuid),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Service(id) => write!(f, "service:{id}"),
            Topic::Environment(id) => write!(f, "environment:{id}"),
        }
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| format!("topic '{s}' has no ':'"))?;
        let id = Uuid::parse_str(id).map_err(|e| format!("topic '{s}' has an invalid id: {e}"))?;

        match kind {
            "service" => Ok(Topic::Service(id)),
            "environment" => Ok(Topic::Environment(id)),
            other => Err(format!("unknown topic kind '{other}'")),
        }
    }
}
