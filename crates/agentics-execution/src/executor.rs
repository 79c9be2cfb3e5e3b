//! Operation wrappers: run caller-supplied async operations inside a fully
//! instrumented execution context.
//!
//! This is the only place where collaborator failures are caught. Callers of
//! [`SpanExecutor::execute_with_spans`] and
//! [`SpanExecutor::execute_multi_repo_with_spans`] always receive a
//! [`CoreExecutionResult`], never an error.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::InstrumentationConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::evidence::{Artifact, Evidence};
use crate::graph::CoreExecutionResult;
use crate::ids::{SpanId, SpanIdGenerator, UuidIdGenerator};

/// Boxed future returned by a collaborator call.
pub type OperationFuture<'a, T> = BoxFuture<'a, anyhow::Result<T>>;

/// Turns a successful payload into JSON for result artifacts and hash evidence.
pub type ResultSnapshot<T> = fn(&T) -> serde_json::Result<serde_json::Value>;

/// One collaborator call in a multi-repo operation.
pub struct RepoOperation<'a, T> {
    pub repo_name: String,
    pub agent_name: String,
    pub operation: String,
    run: Box<dyn FnOnce() -> OperationFuture<'a, T> + Send + 'a>,
    snapshot: Option<ResultSnapshot<T>>,
}

impl<'a, T> RepoOperation<'a, T> {
    pub fn new<F, Fut>(
        repo_name: impl Into<String>,
        agent_name: impl Into<String>,
        operation: impl Into<String>,
        run: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'a,
    {
        Self {
            repo_name: repo_name.into(),
            agent_name: agent_name.into(),
            operation: operation.into(),
            run: Box::new(move || run().boxed()),
            snapshot: None,
        }
    }

    /// Let the executor's result artifacts and hash evidence see this
    /// operation's payload.
    pub fn recording_result(mut self) -> Self
    where
        T: Serialize,
    {
        self.snapshot = Some(snapshot_of::<T>);
        self
    }
}

impl<T> fmt::Debug for RepoOperation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoOperation")
            .field("repo_name", &self.repo_name)
            .field("agent_name", &self.agent_name)
            .field("operation", &self.operation)
            .field("records_result", &self.snapshot.is_some())
            .finish_non_exhaustive()
    }
}

fn snapshot_of<T: Serialize>(value: &T) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(value)
}

/// Runs operations under span instrumentation.
///
/// Holds the configuration and id generator shared by every context it
/// opens. Cheap to clone.
#[derive(Clone)]
pub struct SpanExecutor {
    config: InstrumentationConfig,
    ids: Arc<dyn SpanIdGenerator>,
}

impl Default for SpanExecutor {
    fn default() -> Self {
        Self::new(InstrumentationConfig::default())
    }
}

impl SpanExecutor {
    pub fn new(config: InstrumentationConfig) -> Self {
        Self {
            config,
            ids: Arc::new(UuidIdGenerator),
        }
    }

    /// Executor configured from `AGENTICS_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(InstrumentationConfig::from_env())
    }

    /// Replace the id generator, e.g. with a deterministic one in tests.
    pub fn with_id_generator(mut self, ids: Arc<dyn SpanIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// Open a bare context sharing this executor's settings.
    pub fn open_context(
        &self,
        core_name: &str,
        parent_span_id: Option<SpanId>,
    ) -> ExecutionContext {
        ExecutionContext::with_settings(
            core_name,
            parent_span_id,
            Arc::clone(&self.ids),
            self.config.clone(),
        )
    }

    /// Run a single operation as core -> repo -> agent.
    ///
    /// The payload is opaque here; see
    /// [`SpanExecutor::execute_recorded_with_spans`] to record it.
    pub async fn execute_with_spans<T, E, F, Fut>(
        &self,
        core_name: &str,
        parent_span_id: Option<SpanId>,
        repo_name: &str,
        agent_name: &str,
        operation: &str,
        run: F,
    ) -> CoreExecutionResult<T>
    where
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut ctx = self.open_context(core_name, parent_span_id);
        let step = Step {
            repo_name,
            agent_name,
            operation,
            snapshot: None,
        };
        let outcome = self.run_step(&mut ctx, step, run).await;
        ctx.finalize(outcome)
    }

    /// Like [`SpanExecutor::execute_with_spans`], but a successful payload
    /// feeds the result artifact and hash evidence when they are enabled.
    pub async fn execute_recorded_with_spans<T, E, F, Fut>(
        &self,
        core_name: &str,
        parent_span_id: Option<SpanId>,
        repo_name: &str,
        agent_name: &str,
        operation: &str,
        run: F,
    ) -> CoreExecutionResult<T>
    where
        T: Serialize,
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut ctx = self.open_context(core_name, parent_span_id);
        let step = Step {
            repo_name,
            agent_name,
            operation,
            snapshot: Some(snapshot_of::<T>),
        };
        let outcome = self.run_step(&mut ctx, step, run).await;
        ctx.finalize(outcome)
    }

    /// Run several collaborator calls, strictly in order, under one core span.
    ///
    /// A failing collaborator does not stop the ones after it. The aggregator
    /// only runs when every collaborator succeeded; if it fails, the payload
    /// is absent but no span records that.
    pub async fn execute_multi_repo_with_spans<'a, T, R, A>(
        &self,
        core_name: &str,
        parent_span_id: Option<SpanId>,
        repos: Vec<RepoOperation<'a, T>>,
        aggregator: A,
    ) -> CoreExecutionResult<R>
    where
        A: FnOnce(Vec<T>) -> anyhow::Result<R>,
    {
        let mut ctx = self.open_context(core_name, parent_span_id);
        let mut results: Vec<Option<T>> = Vec::with_capacity(repos.len());

        for repo in repos {
            let RepoOperation {
                repo_name,
                agent_name,
                operation,
                run,
                snapshot,
            } = repo;
            let step = Step {
                repo_name: &repo_name,
                agent_name: &agent_name,
                operation: &operation,
                snapshot,
            };
            let outcome = self.run_step(&mut ctx, step, run).await;
            results.push(outcome);
        }

        let payload = if results.iter().all(Option::is_some) {
            match aggregator(results.into_iter().flatten().collect()) {
                Ok(payload) => Some(payload),
                Err(err) => {
                    tracing::warn!(core = core_name, error = %err, "Aggregator failed");
                    None
                }
            }
        } else {
            None
        };

        ctx.finalize(payload)
    }

    /// Open a repo + agent pair, await the operation and record its outcome.
    async fn run_step<T, E, F, Fut>(
        &self,
        ctx: &mut ExecutionContext,
        step: Step<'_, T>,
        run: F,
    ) -> Option<T>
    where
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let Step {
            repo_name,
            agent_name,
            operation,
            snapshot,
        } = step;

        let repo = ctx.start_repo_span(repo_name);
        let agent = match ctx.start_agent_span(&repo.span_id, agent_name, operation) {
            Ok(agent) => agent,
            Err(err) => {
                tracing::error!(error = %err, repo = repo_name, "Could not open agent span");
                bookkeeping(ctx.fail_repo_span(&repo.span_id, vec![err.to_string()]));
                return None;
            }
        };

        match run().await {
            Ok(value) => {
                let evidence = Evidence::id(
                    format!("{}:{}:{}", repo_name, operation, agent.span_id),
                    format!("{} completed operation '{}'", agent_name, operation),
                );
                bookkeeping(ctx.attach_evidence_to_span(&agent.span_id, evidence));
                if let Some(snapshot) = snapshot {
                    let content = snapshot(&value);
                    self.record_result(ctx, &agent.span_id, repo_name, operation, content);
                }
                bookkeeping(ctx.complete_agent_span(&agent.span_id));
                bookkeeping(ctx.complete_repo_span(&repo.span_id));
                Some(value)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(
                    repo = repo_name,
                    agent = agent_name,
                    operation = operation,
                    error = %message,
                    "Operation failed"
                );
                bookkeeping(ctx.fail_agent_span(&agent.span_id, vec![message.clone()]));
                bookkeeping(ctx.fail_repo_span(
                    &repo.span_id,
                    vec![format!("Agent \"{}\" failed: {}", agent_name, message)],
                ));
                None
            }
        }
    }

    fn record_result(
        &self,
        ctx: &mut ExecutionContext,
        agent_span_id: &SpanId,
        repo_name: &str,
        operation: &str,
        content: serde_json::Result<serde_json::Value>,
    ) {
        if !self.config.attach_result_artifacts && !self.config.hash_result_evidence {
            return;
        }
        let content = match content {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(error = %err, "Result not serializable, extras skipped");
                return;
            }
        };

        if self.config.hash_result_evidence {
            match Evidence::sha256_of(&content, format!("SHA-256 of '{}' result", operation)) {
                Ok(evidence) => bookkeeping(ctx.attach_evidence_to_span(agent_span_id, evidence)),
                Err(err) => tracing::warn!(error = %err, "Result not hashable, hash skipped"),
            }
        }

        if self.config.attach_result_artifacts {
            let id = format!("{}:{}:{}:result", repo_name, operation, agent_span_id);
            let artifact = Artifact::new(id, "operation_result", operation, content);
            bookkeeping(ctx.attach_artifact_to_span(agent_span_id, artifact));
        }
    }
}

/// Names and optional snapshot for one repo + agent pair.
struct Step<'s, T> {
    repo_name: &'s str,
    agent_name: &'s str,
    operation: &'s str,
    snapshot: Option<ResultSnapshot<T>>,
}

fn bookkeeping(result: Result<()>) {
    if let Err(err) = result {
        tracing::error!(error = %err, "Span bookkeeping failed");
    }
}

/// Run a single operation with the default executor.
pub async fn execute_with_spans<T, E, F, Fut>(
    core_name: &str,
    parent_span_id: Option<SpanId>,
    repo_name: &str,
    agent_name: &str,
    operation: &str,
    run: F,
) -> CoreExecutionResult<T>
where
    E: fmt::Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    SpanExecutor::default()
        .execute_with_spans(core_name, parent_span_id, repo_name, agent_name, operation, run)
        .await
}

/// Run several collaborator calls with the default executor.
pub async fn execute_multi_repo_with_spans<'a, T, R, A>(
    core_name: &str,
    parent_span_id: Option<SpanId>,
    repos: Vec<RepoOperation<'a, T>>,
    aggregator: A,
) -> CoreExecutionResult<R>
where
    A: FnOnce(Vec<T>) -> anyhow::Result<R>,
{
    SpanExecutor::default()
        .execute_multi_repo_with_spans(core_name, parent_span_id, repos, aggregator)
        .await
}
