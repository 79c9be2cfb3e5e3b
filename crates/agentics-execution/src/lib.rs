//! Agentics execution spans for coordinated operations.
//!
//! This crate records a hierarchical, machine-verifiable trace of what
//! happened while an operation coordinated one or more external
//! collaborators (marketplace, analytics, benchmark services and the like),
//! validates it against structural invariants, and hands it back in full
//! whether the operation succeeded or not.
//!
//! # Span Hierarchy
//!
//! ```text
//! Core (one per logical operation, optionally parented to a calling engine)
//!   └─ Repo (one per collaborator invocation)
//!       └─ Agent (one or more concrete operations, carrying evidence)
//! ```
//!
//! # Usage
//!
//! 1. Use [`SpanExecutor`] (or the free [`execute_with_spans`] /
//!    [`execute_multi_repo_with_spans`]) to wrap async collaborator calls.
//! 2. Use [`ExecutionContext`] directly when the span layout is driven by hand,
//!    or when a collaborator hands back spans of its own.
//! 3. Use [`validate_execution_graph`] on any graph, including third-party ones.
//!
//! ```rust,no_run
//! use agentics_execution::{execute_with_spans, SpanId};
//!
//! # async fn run() {
//! let result = execute_with_spans(
//!     "model-lookup",
//!     Some(SpanId::from("engine-span-42")),
//!     "marketplace",
//!     "search-agent",
//!     "search",
//!     || async { Ok::<_, std::io::Error>(vec!["model-a", "model-b"]) },
//! )
//! .await;
//!
//! assert!(result.success);
//! println!("{}", serde_json::to_string_pretty(&result.execution_graph).unwrap());
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod evidence;
pub mod executor;
pub mod graph;
pub mod ids;
pub mod span;
pub mod validator;

pub use config::{InstrumentationConfig, InstrumentationConfigBuilder};
pub use context::{ExecutionContext, InvocationContext};
pub use error::{Result, SpanError};
pub use evidence::{Artifact, Evidence, EvidenceType};
pub use executor::{
    execute_multi_repo_with_spans, execute_with_spans, OperationFuture, RepoOperation,
    ResultSnapshot, SpanExecutor,
};
pub use graph::{CoreExecutionResult, ExecutionGraph};
pub use ids::{SequentialIdGenerator, SpanId, SpanIdGenerator, UuidIdGenerator};
pub use span::{
    attach_artifact, attach_evidence, complete_span, create_agent_span, create_core_span,
    create_repo_span, fail_span, ExecutionSpan, SpanKind, SpanStatus, SpanType,
};
pub use validator::{
    is_valid_execution_graph, validate_execution_graph, ValidationFailure, ValidationRule,
};
