//! Core data model.
//!
//! Two identities flow through the engine and must not be confused:
//! a [`ContentKey`] names *what an item says* (equal text, equal key, shared
//! cache entry), while an [`ItemIdentity`] names *which node said it* (one per
//! discovered node, never reused within a session).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Keys and identities
// ---------------------------------------------------------------------------

/// Fixed-length cache key derived from normalized content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(pub(crate) String);

impl ContentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node identifier. Opaque to everything except the resolver that mints it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemIdentity(pub(crate) String);

impl ItemIdentity {
    /// Wrap an identifier previously minted by the resolver, e.g. one read
    /// back from a node marker.
    pub fn from_marker(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cache entries
// ---------------------------------------------------------------------------

/// A cached analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Raw verdict text as returned by the analysis service.
    pub result: String,
    /// When the result was computed, epoch milliseconds.
    pub timestamp: i64,
    /// The item that first produced this result. Informational only: other
    /// items with the same content read the entry too.
    pub source_item_identity: ItemIdentity,
}

impl CacheEntry {
    /// Entry stamped with the current time.
    pub fn new(result: impl Into<String>, source: ItemIdentity) -> Self {
        Self::at(result, source, Utc::now().timestamp_millis())
    }

    pub fn at(result: impl Into<String>, source: ItemIdentity, timestamp: i64) -> Self {
        Self {
            result: result.into(),
            timestamp,
            source_item_identity: source,
        }
    }

    /// Valid iff `now - timestamp < ttl`.
    pub fn is_fresh_at(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.timestamp) < ttl_millis(ttl)
    }
}

/// TTL in milliseconds, clamped into `i64`.
pub(crate) fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Read-only snapshot of the cache for the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    /// Time of the last mutation (put, clear, eviction) in this process.
    pub last_update: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Verdict category assigned to a raw result for annotation.
///
/// The sink decides how each category looks; the engine only decides which
/// one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ExpressiveTrue,
    ExpressiveFalse,
    True,
    False,
    /// Nothing matched. The raw result is shown as-is.
    Unclassified,
}

impl Category {
    /// Text to show for a result in this category.
    pub fn display_text<'a>(&self, raw: &'a str) -> &'a str {
        match self {
            Category::ExpressiveTrue => "Expressive True",
            Category::ExpressiveFalse => "Expressive False",
            Category::True => "True",
            Category::False => "False",
            Category::Unclassified => raw,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::ExpressiveTrue => "expressive_true",
            Category::ExpressiveFalse => "expressive_false",
            Category::True => "true",
            Category::False => "false",
            Category::Unclassified => "unclassified",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Liveness check answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub session: Uuid,
    pub active: bool,
    pub cycles_run: u64,
    pub pending: usize,
    pub finalized: usize,
    pub cache_entries: usize,
    pub timestamp: DateTime<Utc>,
}
