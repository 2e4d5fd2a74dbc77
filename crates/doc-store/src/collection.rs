//! Document collections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four document collections of the grid domain.
///
/// Snapshot schemas are opaque JSON to the store; the collection only
/// namespaces document ids and channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Table metadata (name, icon, description).
    Table,
    /// Field definitions within a table.
    Field,
    /// View definitions (filters, sorts, grouping).
    View,
    /// Row data keyed by field id.
    Record,
}

impl Collection {
    /// Stable lowercase name used in channels and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Table => "table",
            Collection::Field => "field",
            Collection::View => "view",
            Collection::Record => "record",
        }
    }

    /// All collections, in schema order.
    pub fn all() -> [Collection; 4] {
        [
            Collection::Table,
            Collection::Field,
            Collection::View,
            Collection::Record,
        ]
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Collection::Table),
            "field" => Ok(Collection::Field),
            "view" => Ok(Collection::View),
            "record" => Ok(Collection::Record),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}
