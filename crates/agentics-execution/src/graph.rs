//! The execution graph and the terminal result returned by every wrapper.

use serde::{Deserialize, Serialize};

use crate::ids::SpanId;
use crate::span::{ExecutionSpan, SpanStatus, SpanType};
use crate::validator::ValidationFailure;

/// Ordered collection of every span recorded for one logical operation.
///
/// Append order is causal: a parent is always appended at or before its
/// first child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub spans: Vec<ExecutionSpan>,
}

impl ExecutionGraph {
    pub fn new(spans: Vec<ExecutionSpan>) -> Self {
        Self { spans }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, span_id: &SpanId) -> Option<&ExecutionSpan> {
        self.spans.iter().find(|s| &s.span_id == span_id)
    }

    /// Direct children of `span_id`, in append order.
    pub fn children_of<'a>(
        &'a self,
        span_id: &'a SpanId,
    ) -> impl Iterator<Item = &'a ExecutionSpan> + 'a {
        self.spans
            .iter()
            .filter(move |s| s.parent_span_id.as_ref() == Some(span_id))
    }

    pub fn spans_of_type(&self, span_type: SpanType) -> impl Iterator<Item = &ExecutionSpan> {
        self.spans.iter().filter(move |s| s.span_type() == span_type)
    }

    pub fn core_spans(&self) -> impl Iterator<Item = &ExecutionSpan> {
        self.spans_of_type(SpanType::Core)
    }

    pub fn failed_spans(&self) -> impl Iterator<Item = &ExecutionSpan> {
        self.spans.iter().filter(|s| s.status == SpanStatus::Failed)
    }
}

/// Output contract of every instrumented operation.
///
/// The full execution graph is always present, whether or not the operation
/// succeeded. `success` is true only when the graph is structurally valid
/// and no child span failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreExecutionResult<T> {
    pub success: bool,
    pub core_span_id: SpanId,
    pub execution_graph: ExecutionGraph,
    pub validation_failures: Vec<ValidationFailure>,
    pub failure_reasons: Vec<String>,
    /// The caller's domain payload.
    pub result: Option<T>,
}

impl<T> CoreExecutionResult<T> {
    /// The core span as recorded in the graph.
    pub fn core_span(&self) -> Option<&ExecutionSpan> {
        self.execution_graph.get(&self.core_span_id)
    }

    /// Transform the payload, keeping the execution record.
    pub fn map_result<U, F>(self, f: F) -> CoreExecutionResult<U>
    where
        F: FnOnce(T) -> U,
    {
        CoreExecutionResult {
            success: self.success,
            core_span_id: self.core_span_id,
            execution_graph: self.execution_graph,
            validation_failures: self.validation_failures,
            failure_reasons: self.failure_reasons,
            result: self.result.map(f),
        }
    }

    /// Split into the payload and the execution graph.
    pub fn into_parts(self) -> (Option<T>, ExecutionGraph) {
        (self.result, self.execution_graph)
    }
}
