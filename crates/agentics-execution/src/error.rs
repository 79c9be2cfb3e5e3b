//! Error types for execution context operations
//!
//! These cover misuse of the builder API only. Failures of the instrumented
//! operations themselves are never errors here: they are recorded on spans.

use thiserror::Error;

use crate::ids::SpanId;
use crate::span::{SpanStatus, SpanType};

/// Main error type for span bookkeeping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanError {
    /// No span with this id is tracked by the context
    #[error("Span not found: {0}")]
    SpanNotFound(SpanId),

    /// The span exists but sits at a different level than the operation expects
    #[error("Span {span_id} has kind {actual}, expected {expected}")]
    KindMismatch {
        span_id: SpanId,
        expected: SpanType,
        actual: SpanType,
    },

    /// An ingested span reuses an id already present in the context
    #[error("Duplicate span id: {0}")]
    DuplicateSpan(SpanId),

    /// The span already completed or failed; it transitions exactly once
    #[error("Span {span_id} is already {status}")]
    AlreadyTerminal { span_id: SpanId, status: SpanStatus },
}

impl SpanError {
    /// Check whether the caller passed a bad id (vs. a clash between graphs)
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            SpanError::SpanNotFound(_) | SpanError::KindMismatch { .. }
        )
    }
}

/// Result type alias for span bookkeeping
pub type Result<T> = std::result::Result<T, SpanError>;
