//! Execution context: the single-owner span builder for one logical operation.
//!
//! A context is created per operation, never shared, and consumed by
//! [`ExecutionContext::finalize`]. Span values themselves are immutable; the
//! context owns the ordered, id-keyed arena they live in and replaces entries
//! in place as spans transition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::InstrumentationConfig;
use crate::error::{Result, SpanError};
use crate::evidence::{Artifact, Evidence};
use crate::graph::{CoreExecutionResult, ExecutionGraph};
use crate::ids::{SpanId, SpanIdGenerator, UuidIdGenerator};
use crate::span::{ExecutionSpan, SpanType};
use crate::validator::{validate_spans, ValidationFailure};

/// Identifiers handed to a collaborator so it can parent the spans it builds
/// on its own side before they are ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Parent for the collaborator's repo-level spans.
    pub parent_span_id: SpanId,
    /// Core span of the operation.
    pub core_span_id: SpanId,
}

/// Builder for one operation's execution graph.
pub struct ExecutionContext {
    ids: Arc<dyn SpanIdGenerator>,
    config: InstrumentationConfig,
    core_span_id: SpanId,
    spans: IndexMap<SpanId, ExecutionSpan>,
}

impl ExecutionContext {
    /// Open a context with default identifiers and configuration.
    pub fn new(core_name: &str, parent_span_id: Option<SpanId>) -> Self {
        Self::with_settings(
            core_name,
            parent_span_id,
            Arc::new(UuidIdGenerator),
            InstrumentationConfig::default(),
        )
    }

    /// Open a context with an explicit id generator and configuration.
    pub fn with_settings(
        core_name: &str,
        parent_span_id: Option<SpanId>,
        ids: Arc<dyn SpanIdGenerator>,
        config: InstrumentationConfig,
    ) -> Self {
        let core = ExecutionSpan::new_core(ids.as_ref(), core_name, parent_span_id);
        let core_span_id = core.span_id.clone();
        tracing::debug!(
            span_id = %core_span_id,
            core = core_name,
            "Opened execution context"
        );

        let mut spans = IndexMap::new();
        spans.insert(core_span_id.clone(), core);

        Self {
            ids,
            config,
            core_span_id,
            spans,
        }
    }

    pub fn core_span_id(&self) -> &SpanId {
        &self.core_span_id
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    pub fn span(&self, span_id: &SpanId) -> Option<&ExecutionSpan> {
        self.spans.get(span_id)
    }

    /// All spans recorded so far, in append order.
    pub fn spans(&self) -> impl Iterator<Item = &ExecutionSpan> {
        self.spans.values()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Snapshot of the graph as it stands.
    pub fn graph(&self) -> ExecutionGraph {
        ExecutionGraph::new(self.spans.values().cloned().collect())
    }

    /// Validate the graph as it stands, without finalizing.
    pub fn validate(&self) -> Vec<ValidationFailure> {
        let spans: Vec<&ExecutionSpan> = self.spans.values().collect();
        validate_spans(&spans)
    }

    pub fn invocation_context(&self) -> InvocationContext {
        InvocationContext {
            parent_span_id: self.core_span_id.clone(),
            core_span_id: self.core_span_id.clone(),
        }
    }

    /// Start a repo span parented to the core span.
    pub fn start_repo_span(&mut self, repo_name: &str) -> ExecutionSpan {
        let span = ExecutionSpan::new_repo(self.ids.as_ref(), repo_name, self.core_span_id.clone());
        tracing::debug!(span_id = %span.span_id, repo = repo_name, "Started repo span");
        self.spans.insert(span.span_id.clone(), span.clone());
        span
    }

    /// Start an agent span under a repo span previously started on this context.
    pub fn start_agent_span(
        &mut self,
        repo_span_id: &SpanId,
        agent_name: &str,
        operation: &str,
    ) -> Result<ExecutionSpan> {
        self.expect_kind(repo_span_id, SpanType::Repo)?;

        let parent = repo_span_id.clone();
        let span = ExecutionSpan::new_agent(self.ids.as_ref(), agent_name, operation, parent);
        tracing::debug!(
            span_id = %span.span_id,
            parent_span_id = %repo_span_id,
            agent = agent_name,
            operation = operation,
            "Started agent span"
        );
        self.spans.insert(span.span_id.clone(), span.clone());
        Ok(span)
    }

    pub fn complete_repo_span(&mut self, span_id: &SpanId) -> Result<()> {
        self.finish(span_id, SpanType::Repo, Outcome::Completed)
    }

    /// Fail a repo span. It is failed even when `reasons` is empty.
    pub fn fail_repo_span(&mut self, span_id: &SpanId, reasons: Vec<String>) -> Result<()> {
        self.finish(span_id, SpanType::Repo, Outcome::Failed(reasons))
    }

    pub fn complete_agent_span(&mut self, span_id: &SpanId) -> Result<()> {
        self.finish(span_id, SpanType::Agent, Outcome::Completed)
    }

    /// Fail an agent span. It is failed even when `reasons` is empty.
    pub fn fail_agent_span(&mut self, span_id: &SpanId, reasons: Vec<String>) -> Result<()> {
        self.finish(span_id, SpanType::Agent, Outcome::Failed(reasons))
    }

    pub fn attach_artifact_to_span(&mut self, span_id: &SpanId, artifact: Artifact) -> Result<()> {
        let slot = self.slot(span_id)?;
        *slot = slot.with_artifact(artifact);
        Ok(())
    }

    pub fn attach_evidence_to_span(&mut self, span_id: &SpanId, evidence: Evidence) -> Result<()> {
        let slot = self.slot(span_id)?;
        *slot = slot.with_evidence(evidence);
        Ok(())
    }

    /// Append spans built by an instrumentation-aware collaborator, verbatim.
    ///
    /// No renaming or re-parenting happens; structural problems surface at
    /// validation. The batch is rejected as a whole if any id is already
    /// tracked or repeated within the batch.
    pub fn ingest_repo_spans(&mut self, spans: Vec<ExecutionSpan>) -> Result<()> {
        let mut seen = HashSet::new();
        for span in &spans {
            if self.spans.contains_key(&span.span_id) || !seen.insert(&span.span_id) {
                return Err(SpanError::DuplicateSpan(span.span_id.clone()));
            }
        }

        tracing::debug!(count = spans.len(), "Ingesting collaborator spans");
        for span in spans {
            self.spans.insert(span.span_id.clone(), span);
        }
        Ok(())
    }

    /// Close the context and produce the terminal result.
    ///
    /// The core span completes only when the graph is structurally valid and
    /// no child span failed; otherwise it fails with one reason per violation
    /// plus a summary of failed children.
    pub fn finalize<T>(self, result: Option<T>) -> CoreExecutionResult<T> {
        let record_durations = self.config.record_durations;
        let core_span_id = self.core_span_id;
        let mut spans: Vec<ExecutionSpan> = self.spans.into_values().collect();

        let validation_failures = {
            let refs: Vec<&ExecutionSpan> = spans.iter().collect();
            validate_spans(&refs)
        };

        let mut failure_reasons: Vec<String> =
            validation_failures.iter().map(ToString::to_string).collect();
        let failed_children = spans
            .iter()
            .filter(|s| !s.is_core() && s.is_failed())
            .count();
        if failed_children > 0 {
            failure_reasons.push(format!("{} child span(s) failed", failed_children));
        }

        let success = failure_reasons.is_empty();
        if let Some(core) = spans.iter_mut().find(|s| s.span_id == core_span_id) {
            let next = if success {
                core.completed()
            } else {
                core.failed(failure_reasons.iter().cloned())
            };
            *core = stamp_duration(next, record_durations);
        }

        if success {
            tracing::info!(
                core_span_id = %core_span_id,
                spans = spans.len(),
                "Execution finalized"
            );
        } else {
            tracing::warn!(
                core_span_id = %core_span_id,
                spans = spans.len(),
                validation_failures = validation_failures.len(),
                failed_children = failed_children,
                "Execution finalized with failures"
            );
        }

        CoreExecutionResult {
            success,
            core_span_id,
            execution_graph: ExecutionGraph::new(spans),
            validation_failures,
            failure_reasons,
            result,
        }
    }

    fn slot(&mut self, span_id: &SpanId) -> Result<&mut ExecutionSpan> {
        self.spans
            .get_mut(span_id)
            .ok_or_else(|| SpanError::SpanNotFound(span_id.clone()))
    }

    fn expect_kind(&self, span_id: &SpanId, expected: SpanType) -> Result<()> {
        let span = self
            .spans
            .get(span_id)
            .ok_or_else(|| SpanError::SpanNotFound(span_id.clone()))?;
        if span.span_type() != expected {
            return Err(SpanError::KindMismatch {
                span_id: span_id.clone(),
                expected,
                actual: span.span_type(),
            });
        }
        Ok(())
    }

    /// The one terminal transition of a running span.
    fn finish(&mut self, span_id: &SpanId, expected: SpanType, outcome: Outcome) -> Result<()> {
        self.expect_kind(span_id, expected)?;
        let record_durations = self.config.record_durations;
        let slot = self.slot(span_id)?;
        if slot.status.is_terminal() {
            return Err(SpanError::AlreadyTerminal {
                span_id: span_id.clone(),
                status: slot.status,
            });
        }

        let next = match outcome {
            Outcome::Completed => {
                tracing::debug!(span_id = %span_id, kind = %expected, "Span completed");
                slot.completed()
            }
            Outcome::Failed(reasons) => {
                tracing::warn!(
                    span_id = %span_id,
                    kind = %expected,
                    reasons = ?reasons,
                    "Span failed"
                );
                slot.failed(reasons)
            }
        };
        *slot = stamp_duration(next, record_durations);
        Ok(())
    }
}

enum Outcome {
    Completed,
    Failed(Vec<String>),
}

fn stamp_duration(span: ExecutionSpan, enabled: bool) -> ExecutionSpan {
    match span.duration_ms() {
        Some(ms) if enabled => span.with_metadata("duration_ms", serde_json::json!(ms)),
        _ => span,
    }
}
