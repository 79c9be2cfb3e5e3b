//! Span identifiers and the generators that mint them.
//!
//! Identifiers are opaque strings so that spans produced by a calling engine
//! or by an instrumentation-aware collaborator can live in the same graph as
//! the ones minted here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Unique identifier for a span within an execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    /// Wrap an existing identifier, e.g. one handed over by a calling engine.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SpanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for SpanId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Source of fresh span identifiers.
///
/// Implementations must never hand out the same identifier twice.
pub trait SpanIdGenerator: Send + Sync {
    fn next_id(&self) -> SpanId;
}

/// Default generator: random 128-bit identifiers formatted as UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl SpanIdGenerator for UuidIdGenerator {
    fn next_id(&self) -> SpanId {
        SpanId::from(Uuid::new_v4())
    }
}

/// Deterministic generator producing `<prefix>-1`, `<prefix>-2`, ...
///
/// Intended for tests and reproducible fixtures.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("span")
    }
}

impl SpanIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> SpanId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        SpanId(format!("{}-{}", self.prefix, n))
    }
}
