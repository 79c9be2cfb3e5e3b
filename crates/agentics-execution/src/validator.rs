//! Structural validation of execution graphs.
//!
//! [`validate_execution_graph`] is a pure function: it may be called on a
//! finished graph, on a partial graph mid-execution, or on a graph built
//! entirely by a third party. It reports every violation it finds rather
//! than stopping at the first, with one exception: without a core span the
//! hierarchy rules have no root to start from, so only
//! [`ValidationRule::CoreSpanRequired`] is reported.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::graph::ExecutionGraph;
use crate::ids::SpanId;
use crate::span::{ExecutionSpan, SpanType};

/// Structural rules an execution graph must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    /// The graph contains at least one core span.
    CoreSpanRequired,
    /// Every core span has at least one repo child.
    CoreMustHaveRepoChildren,
    /// Every repo span has at least one agent child.
    RepoMustHaveAgentChildren,
    /// Every non-core span's parent exists in the graph.
    ValidParentReference,
    /// No span is its own parent.
    NoSelfReference,
    /// Every evidence value is non-empty.
    EvidenceMustBeVerifiable,
    /// Every artifact has a non-empty id.
    ArtifactMustHaveId,
}

impl ValidationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationRule::CoreSpanRequired => "core_span_required",
            ValidationRule::CoreMustHaveRepoChildren => "core_must_have_repo_children",
            ValidationRule::RepoMustHaveAgentChildren => "repo_must_have_agent_children",
            ValidationRule::ValidParentReference => "valid_parent_reference",
            ValidationRule::NoSelfReference => "no_self_reference",
            ValidationRule::EvidenceMustBeVerifiable => "evidence_must_be_verifiable",
            ValidationRule::ArtifactMustHaveId => "artifact_must_have_id",
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural violation found in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// The offending span. `None` only for [`ValidationRule::CoreSpanRequired`].
    pub span_id: Option<SpanId>,
    pub rule: ValidationRule,
    pub message: String,
}

impl ValidationFailure {
    fn new(span_id: Option<&SpanId>, rule: ValidationRule, message: String) -> Self {
        Self {
            span_id: span_id.cloned(),
            rule,
            message,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Report every structural violation in `graph`, in a stable order.
pub fn validate_execution_graph(graph: &ExecutionGraph) -> Vec<ValidationFailure> {
    let spans: Vec<&ExecutionSpan> = graph.spans.iter().collect();
    validate_spans(&spans)
}

/// Shorthand for "[`validate_execution_graph`] found nothing".
pub fn is_valid_execution_graph(graph: &ExecutionGraph) -> bool {
    validate_execution_graph(graph).is_empty()
}

pub(crate) fn validate_spans<'a>(spans: &[&'a ExecutionSpan]) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    let known: HashSet<&'a SpanId> = spans.iter().copied().map(|s| &s.span_id).collect();
    let mut children: HashMap<&'a SpanId, Vec<&'a ExecutionSpan>> = HashMap::new();
    for span in spans.iter().copied() {
        if let Some(parent) = &span.parent_span_id {
            children.entry(parent).or_default().push(span);
        }
    }
    let children_of = |id: &SpanId, span_type: SpanType| -> Vec<&'a ExecutionSpan> {
        children
            .get(id)
            .map(|c| {
                c.iter()
                    .copied()
                    .filter(|s| s.span_type() == span_type)
                    .collect()
            })
            .unwrap_or_default()
    };

    let cores: Vec<&'a ExecutionSpan> = spans.iter().copied().filter(|s| s.is_core()).collect();
    if cores.is_empty() {
        failures.push(ValidationFailure::new(
            None,
            ValidationRule::CoreSpanRequired,
            "Execution graph contains no core span".to_string(),
        ));
        return failures;
    }

    for core in cores {
        let repos = children_of(&core.span_id, SpanType::Repo);
        if repos.is_empty() {
            failures.push(ValidationFailure::new(
                Some(&core.span_id),
                ValidationRule::CoreMustHaveRepoChildren,
                format!("Core span '{}' has no repo-level children", core.name),
            ));
        }

        for repo in repos {
            if children_of(&repo.span_id, SpanType::Agent).is_empty() {
                failures.push(ValidationFailure::new(
                    Some(&repo.span_id),
                    ValidationRule::RepoMustHaveAgentChildren,
                    format!("Repo span '{}' has no agent-level children", repo.name),
                ));
            }
        }
    }

    for span in spans.iter().copied() {
        if !span.is_core() {
            match &span.parent_span_id {
                Some(parent) if known.contains(parent) => {}
                Some(parent) => failures.push(ValidationFailure::new(
                    Some(&span.span_id),
                    ValidationRule::ValidParentReference,
                    format!(
                        "{} span '{}' references missing parent '{}'",
                        span.span_type(),
                        span.name,
                        parent
                    ),
                )),
                None => failures.push(ValidationFailure::new(
                    Some(&span.span_id),
                    ValidationRule::ValidParentReference,
                    format!("{} span '{}' has no parent", span.span_type(), span.name),
                )),
            }
        }

        if span.parent_span_id.as_ref() == Some(&span.span_id) {
            failures.push(ValidationFailure::new(
                Some(&span.span_id),
                ValidationRule::NoSelfReference,
                format!("Span '{}' is its own parent", span.name),
            ));
        }

        for (index, evidence) in span.evidence.iter().enumerate() {
            if !evidence.is_verifiable() {
                failures.push(ValidationFailure::new(
                    Some(&span.span_id),
                    ValidationRule::EvidenceMustBeVerifiable,
                    format!(
                        "Evidence #{} on span '{}' has an empty value",
                        index, span.name
                    ),
                ));
            }
        }

        for (index, artifact) in span.artifacts.iter().enumerate() {
            if artifact.id.is_empty() {
                failures.push(ValidationFailure::new(
                    Some(&span.span_id),
                    ValidationRule::ArtifactMustHaveId,
                    format!(
                        "Artifact #{} ('{}') on span '{}' has no id",
                        index, artifact.name, span.name
                    ),
                ));
            }
        }
    }

    failures
}
