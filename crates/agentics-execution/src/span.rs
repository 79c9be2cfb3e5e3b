//! Core execution span types for the Agentics execution system.
//!
//! Defines `ExecutionSpan`, `SpanKind`, and `SpanStatus` used to build
//! hierarchical execution graphs: Core -> Repo -> Agent.
//!
//! Span values are never mutated by a lifecycle transition. `completed`,
//! `failed`, `with_artifact` and `with_evidence` each return a new span; the
//! caller replaces the old entry by `span_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::evidence::{Artifact, Evidence};
use crate::ids::{SpanId, SpanIdGenerator};

/// Status of an execution span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Completed,
    Failed,
}

impl SpanStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SpanStatus::Running)
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanStatus::Running => write!(f, "running"),
            SpanStatus::Completed => write!(f, "completed"),
            SpanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Level of a span in the hierarchy, without the level-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    Core,
    Repo,
    Agent,
}

impl fmt::Display for SpanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanType::Core => write!(f, "core"),
            SpanType::Repo => write!(f, "repo"),
            SpanType::Agent => write!(f, "agent"),
        }
    }
}

/// Level of a span together with the fields that only exist at that level.
///
/// Fixed at creation. Serialized inline on the span as `"kind": "<level>"`
/// plus the variant fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanKind {
    /// Root of one logical operation.
    Core,
    /// Invocation of one external collaborator.
    Repo { repo_name: String },
    /// One concrete operation performed within a collaborator invocation.
    Agent { agent_name: String, operation: String },
}

impl SpanKind {
    pub fn span_type(&self) -> SpanType {
        match self {
            SpanKind::Core => SpanType::Core,
            SpanKind::Repo { .. } => SpanType::Repo,
            SpanKind::Agent { .. } => SpanType::Agent,
        }
    }
}

/// A single execution span in the Agentics execution graph.
///
/// Spans form a tree: Core -> Repo -> Agent(s), linked through
/// `parent_span_id`. Each span is JSON-serializable without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSpan {
    pub span_id: SpanId,
    /// Structural parent. Absent only for a root Core span.
    #[serde(default)]
    pub parent_span_id: Option<SpanId>,
    #[serde(flatten)]
    pub kind: SpanKind,
    pub name: String,
    pub status: SpanStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub failure_reasons: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionSpan {
    fn new(
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        kind: SpanKind,
        name: &str,
    ) -> Self {
        Self {
            span_id,
            parent_span_id,
            kind,
            name: name.to_string(),
            status: SpanStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            artifacts: Vec::new(),
            evidence: Vec::new(),
            failure_reasons: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Create a new core-level span.
    ///
    /// `parent_span_id` is `None` for a true root, or the id of a span owned
    /// by a calling engine outside this graph.
    pub fn new_core(
        ids: &dyn SpanIdGenerator,
        name: &str,
        parent_span_id: Option<SpanId>,
    ) -> Self {
        Self::new(ids.next_id(), parent_span_id, SpanKind::Core, name)
    }

    /// Create a new repo-level span parented to a core span.
    pub fn new_repo(ids: &dyn SpanIdGenerator, repo_name: &str, parent_span_id: SpanId) -> Self {
        Self::new(
            ids.next_id(),
            Some(parent_span_id),
            SpanKind::Repo {
                repo_name: repo_name.to_string(),
            },
            repo_name,
        )
    }

    /// Create a new agent-level span parented to a repo span.
    pub fn new_agent(
        ids: &dyn SpanIdGenerator,
        agent_name: &str,
        operation: &str,
        parent_span_id: SpanId,
    ) -> Self {
        Self::new(
            ids.next_id(),
            Some(parent_span_id),
            SpanKind::Agent {
                agent_name: agent_name.to_string(),
                operation: operation.to_string(),
            },
            agent_name,
        )
    }

    pub fn span_type(&self) -> SpanType {
        self.kind.span_type()
    }

    pub fn is_core(&self) -> bool {
        self.span_type() == SpanType::Core
    }

    pub fn is_failed(&self) -> bool {
        self.status == SpanStatus::Failed
    }

    pub fn repo_name(&self) -> Option<&str> {
        match &self.kind {
            SpanKind::Repo { repo_name } => Some(repo_name),
            _ => None,
        }
    }

    pub fn agent_name(&self) -> Option<&str> {
        match &self.kind {
            SpanKind::Agent { agent_name, .. } => Some(agent_name),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<&str> {
        match &self.kind {
            SpanKind::Agent { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Wall-clock duration, available once the span is terminal.
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0) as u64)
    }

    /// Return a copy marked completed.
    ///
    /// Calling this on a completed span re-stamps `end_time`. A failed span
    /// stays failed, so its `failure_reasons` never sit on a completed span.
    #[must_use]
    pub fn completed(&self) -> Self {
        let mut next = self.clone();
        if next.status == SpanStatus::Failed {
            return next;
        }
        next.status = SpanStatus::Completed;
        next.end_time = Some(Utc::now());
        next
    }

    /// Return a copy marked failed, with `reasons` appended.
    #[must_use]
    pub fn failed<I, S>(&self, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.status = SpanStatus::Failed;
        next.end_time = Some(Utc::now());
        next.failure_reasons.extend(reasons.into_iter().map(Into::into));
        next
    }

    /// Return a copy with `artifact` appended.
    #[must_use]
    pub fn with_artifact(&self, artifact: Artifact) -> Self {
        let mut next = self.clone();
        next.artifacts.push(artifact);
        next
    }

    /// Return a copy with `evidence` appended.
    #[must_use]
    pub fn with_evidence(&self, evidence: Evidence) -> Self {
        let mut next = self.clone();
        next.evidence.push(evidence);
        next
    }

    /// Return a copy with one metadata entry set.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value);
        next
    }
}

/// Create a core span. See [`ExecutionSpan::new_core`].
pub fn create_core_span(
    ids: &dyn SpanIdGenerator,
    name: &str,
    parent_span_id: Option<SpanId>,
) -> ExecutionSpan {
    ExecutionSpan::new_core(ids, name, parent_span_id)
}

/// Create a repo span. See [`ExecutionSpan::new_repo`].
pub fn create_repo_span(
    ids: &dyn SpanIdGenerator,
    repo_name: &str,
    parent_span_id: SpanId,
) -> ExecutionSpan {
    ExecutionSpan::new_repo(ids, repo_name, parent_span_id)
}

/// Create an agent span. See [`ExecutionSpan::new_agent`].
pub fn create_agent_span(
    ids: &dyn SpanIdGenerator,
    agent_name: &str,
    operation: &str,
    parent_span_id: SpanId,
) -> ExecutionSpan {
    ExecutionSpan::new_agent(ids, agent_name, operation, parent_span_id)
}

/// Mark a span completed. See [`ExecutionSpan::completed`].
pub fn complete_span(span: &ExecutionSpan) -> ExecutionSpan {
    span.completed()
}

/// Mark a span failed, appending `reasons` (possibly none).
pub fn fail_span<I, S>(span: &ExecutionSpan, reasons: I) -> ExecutionSpan
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    span.failed(reasons)
}

/// Append an artifact. See [`ExecutionSpan::with_artifact`].
pub fn attach_artifact(span: &ExecutionSpan, artifact: Artifact) -> ExecutionSpan {
    span.with_artifact(artifact)
}

/// Append evidence. See [`ExecutionSpan::with_evidence`].
pub fn attach_evidence(span: &ExecutionSpan, evidence: Evidence) -> ExecutionSpan {
    span.with_evidence(evidence)
}
