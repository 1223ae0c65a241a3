// ── Core identity types ──
//
// The backend keys its device and alert tables with integer rows and its
// IoT tables (gateways, nodes, sites) with UUID strings. `EntityId` hides
// which one a record uses.

use serde::{Deserialize, Serialize};
use std::fmt;

use fleetdash_api::RecordId;

// ── EntityId ────────────────────────────────────────────────────────

/// Canonical identifier for a backend record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Numeric(i64),
    Text(String),
}

impl EntityId {
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<RecordId> for EntityId {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Int(n) => Self::Numeric(n),
            RecordId::Text(s) => Self::Text(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Accepts colon-separated, dash-separated, or mixed-case input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_keep_their_shape() {
        assert_eq!(EntityId::from(RecordId::Int(7)), EntityId::Numeric(7));
        assert_eq!(
            EntityId::from(RecordId::from("4c1f")).to_string(),
            "4c1f"
        );
        assert_eq!(EntityId::from(7_i64).as_numeric(), Some(7));
        assert_eq!(EntityId::from("gw").as_numeric(), None);
    }

    #[test]
    fn mac_is_normalized() {
        assert_eq!(MacAddress::new("AA-BB-CC-00-11-22").as_str(), "aa:bb:cc:00:11:22");
    }
}
