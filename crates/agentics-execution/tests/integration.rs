//! Integration tests for Agentics execution spans
//!
//! Covers the operation wrappers end to end:
//! - Single-operation success and failure lifecycles
//! - Multi-repo coordination with full and partial success
//! - Collaborators that hand back their own spans
//! - Lossless JSON round trips of produced graphs

use agentics_execution::{
    execute_multi_repo_with_spans, execute_with_spans, validate_execution_graph,
    CoreExecutionResult, Evidence, EvidenceType, ExecutionGraph, ExecutionSpan,
    InstrumentationConfig, RepoOperation, SequentialIdGenerator, SpanExecutor, SpanId,
    SpanStatus, SpanType, ValidationRule,
};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Overview {
    models: usize,
    requests: u64,
    top_score: f64,
}

fn overview_repos<'a>(analytics_fails: bool) -> Vec<RepoOperation<'a, serde_json::Value>> {
    vec![
        RepoOperation::new("marketplace", "marketplace-agent", "list_models", || async {
            anyhow::Ok(serde_json::json!({"models": 12}))
        }),
        RepoOperation::new("analytics", "analytics-agent", "usage_summary", move || async move {
            if analytics_fails {
                anyhow::bail!("Connection refused");
            }
            Ok(serde_json::json!({"requests": 3400}))
        }),
        RepoOperation::new("benchmarks", "benchmark-agent", "leaderboard", || async {
            anyhow::Ok(serde_json::json!({"top_score": 0.91}))
        }),
    ]
}

fn build_overview(parts: Vec<serde_json::Value>) -> anyhow::Result<Overview> {
    Ok(Overview {
        models: parts[0]["models"].as_u64().unwrap_or_default() as usize,
        requests: parts[1]["requests"].as_u64().unwrap_or_default(),
        top_score: parts[2]["top_score"].as_f64().unwrap_or_default(),
    })
}

fn span_of<T>(result: &CoreExecutionResult<T>, span_type: SpanType) -> Vec<&ExecutionSpan> {
    result
        .execution_graph
        .spans_of_type(span_type)
        .collect()
}

#[tokio::test]
async fn test_single_operation_success() {
    init_tracing();

    let result = execute_with_spans(
        "model-lookup",
        None,
        "marketplace",
        "marketplace-agent",
        "get_model",
        || async { Ok::<_, anyhow::Error>(serde_json::json!({"id": "model-a"})) },
    )
    .await;

    assert!(result.success);
    assert!(result.validation_failures.is_empty());
    assert!(result.failure_reasons.is_empty());
    assert_eq!(result.result, Some(serde_json::json!({"id": "model-a"})));
    assert_eq!(result.execution_graph.len(), 3);

    let core = result.core_span().expect("core span present");
    assert_eq!(core.status, SpanStatus::Completed);
    assert!(core.end_time.is_some());

    let agents = span_of(&result, SpanType::Agent);
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].evidence.len(), 1);
    assert_eq!(agents[0].evidence[0].evidence_type, EvidenceType::Id);
    assert_eq!(agents[0].status, SpanStatus::Completed);
    assert_eq!(span_of(&result, SpanType::Repo)[0].status, SpanStatus::Completed);
}

#[tokio::test]
async fn test_single_operation_failure() {
    init_tracing();

    let result = execute_with_spans(
        "model-lookup",
        Some(SpanId::from("engine-span")),
        "marketplace",
        "marketplace-agent",
        "get_model",
        || async { Err::<serde_json::Value, _>(anyhow::anyhow!("Connection refused")) },
    )
    .await;

    assert!(!result.success);
    assert!(result.result.is_none());
    assert_eq!(result.execution_graph.len(), 3);

    let agent = span_of(&result, SpanType::Agent)[0];
    assert_eq!(agent.status, SpanStatus::Failed);
    assert!(agent.failure_reasons.contains(&"Connection refused".to_string()));
    assert!(agent.evidence.is_empty());

    let repo = span_of(&result, SpanType::Repo)[0];
    assert_eq!(repo.status, SpanStatus::Failed);
    assert_eq!(
        repo.failure_reasons,
        vec!["Agent \"marketplace-agent\" failed: Connection refused"]
    );

    let core = result.core_span().unwrap();
    assert_eq!(core.status, SpanStatus::Failed);
    assert_eq!(core.parent_span_id, Some(SpanId::from("engine-span")));
    assert!(core
        .failure_reasons
        .iter()
        .any(|r| r.contains("child span(s) failed")));
    // agent and repo both failed
    assert_eq!(result.failure_reasons, vec!["2 child span(s) failed"]);
}

#[tokio::test]
async fn test_multi_repo_full_success() {
    init_tracing();

    let repos = overview_repos(false);
    let result = execute_multi_repo_with_spans("overview", None, repos, build_overview).await;

    assert!(result.success);
    assert_eq!(result.execution_graph.len(), 7);
    assert_eq!(
        result.result,
        Some(Overview {
            models: 12,
            requests: 3400,
            top_score: 0.91,
        })
    );

    let repos: Vec<_> = span_of(&result, SpanType::Repo)
        .into_iter()
        .filter_map(|s| s.repo_name())
        .collect();
    assert_eq!(repos, vec!["marketplace", "analytics", "benchmarks"]);
    assert!(result
        .execution_graph
        .spans
        .iter()
        .all(|s| s.status == SpanStatus::Completed));
}

#[tokio::test]
async fn test_multi_repo_partial_failure() {
    init_tracing();

    let repos = overview_repos(true);
    let result = execute_multi_repo_with_spans("overview", None, repos, build_overview).await;

    assert!(!result.success);
    assert!(result.result.is_none());
    assert_eq!(result.execution_graph.len(), 7);

    for repo in span_of(&result, SpanType::Repo) {
        let agents: Vec<_> = result.execution_graph.children_of(&repo.span_id).collect();
        assert_eq!(agents.len(), 1);

        if repo.repo_name() == Some("analytics") {
            assert_eq!(repo.status, SpanStatus::Failed);
            assert_eq!(agents[0].status, SpanStatus::Failed);
            assert_eq!(agents[0].failure_reasons, vec!["Connection refused"]);
        } else {
            assert_eq!(repo.status, SpanStatus::Completed);
            assert_eq!(agents[0].status, SpanStatus::Completed);
            assert_eq!(agents[0].evidence.len(), 1);
        }
    }
    assert_eq!(result.core_span().unwrap().status, SpanStatus::Failed);
}

#[tokio::test]
async fn test_collaborators_run_sequentially() {
    init_tracing();

    let log = Arc::new(Mutex::new(Vec::new()));
    let repos: Vec<RepoOperation<'_, ()>> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let log = Arc::clone(&log);
            RepoOperation::new(name, "agent", "op", move || async move {
                log.lock().unwrap().push(format!("start {}", name));
                tokio::task::yield_now().await;
                log.lock().unwrap().push(format!("end {}", name));
                anyhow::Ok(())
            })
        })
        .collect();

    let result = execute_multi_repo_with_spans("ordered", None, repos, |_| Ok(())).await;

    assert!(result.success);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "start first",
            "end first",
            "start second",
            "end second",
            "start third",
            "end third",
        ]
    );
}

#[tokio::test]
async fn test_instrumentation_aware_collaborator() {
    init_tracing();

    let executor = SpanExecutor::new(InstrumentationConfig::default())
        .with_id_generator(Arc::new(SequentialIdGenerator::new("local")));
    let mut ctx = executor.open_context("overview", None);
    let invocation = ctx.invocation_context();

    // the collaborator builds its own sub-graph against the handed-over parent
    let remote_ids = SequentialIdGenerator::new("remote");
    let repo = ExecutionSpan::new_repo(&remote_ids, "benchmarks", invocation.parent_span_id);
    let parent = repo.span_id.clone();
    let agent = ExecutionSpan::new_agent(&remote_ids, "benchmark-agent", "run_suite", parent)
        .with_evidence(Evidence::uri("https://bench.example.com/runs/77", "benchmark run"))
        .completed();
    ctx.ingest_repo_spans(vec![repo.completed(), agent]).unwrap();

    let result = ctx.finalize(Some("done"));

    assert!(result.success, "{:?}", result.failure_reasons);
    let ids: Vec<_> = result
        .execution_graph
        .spans
        .iter()
        .map(|s| s.span_id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["local-1", "remote-1", "remote-2"]);
}

#[tokio::test]
async fn test_graph_serialization_roundtrip() {
    let repos = overview_repos(true);
    let result = execute_multi_repo_with_spans("overview", None, repos, build_overview).await;

    let json = serde_json::to_string(&result).unwrap();
    let back: CoreExecutionResult<Overview> = serde_json::from_str(&json).unwrap();

    assert_eq!(back, result);
    assert_eq!(
        back.validation_failures.is_empty(),
        validate_execution_graph(&back.execution_graph).is_empty()
    );
}

#[test]
fn test_validator_on_hand_built_graph() {
    let ids = SequentialIdGenerator::new("h");
    let core = ExecutionSpan::new_core(&ids, "overview", None);
    let repo = ExecutionSpan::new_repo(&ids, "analytics", core.span_id.clone());
    let graph = ExecutionGraph::new(vec![core, repo]);

    let rules: Vec<_> = validate_execution_graph(&graph)
        .into_iter()
        .map(|f| f.rule)
        .collect();
    assert_eq!(rules, vec![ValidationRule::RepoMustHaveAgentChildren]);
}

proptest! {
    #[test]
    fn prop_wrapper_graphs_roundtrip(
        outcomes in proptest::collection::vec(any::<bool>(), 0..6),
        core_name in "[a-z][a-z-]{0,12}",
    ) {
        let repos: Vec<RepoOperation<'_, u32>> = outcomes
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let ok = *ok;
                let run = move || async move {
                    if ok {
                        Ok(i as u32)
                    } else {
                        Err(anyhow::anyhow!("collaborator {} failed", i))
                    }
                };
                RepoOperation::new(format!("repo-{}", i), format!("agent-{}", i), "op", run)
            })
            .collect();

        let result = futures::executor::block_on(execute_multi_repo_with_spans(
            &core_name,
            None,
            repos,
            |values: Vec<u32>| Ok(values.iter().sum::<u32>()),
        ));

        prop_assert_eq!(result.execution_graph.len(), 1 + 2 * outcomes.len());

        let json = serde_json::to_value(&result.execution_graph).unwrap();
        let back: ExecutionGraph = serde_json::from_value(json).unwrap();

        prop_assert_eq!(back.len(), result.execution_graph.len());
        for (a, b) in back.spans.iter().zip(result.execution_graph.spans.iter()) {
            prop_assert_eq!(&a.span_id, &b.span_id);
            prop_assert_eq!(&a.parent_span_id, &b.parent_span_id);
            prop_assert_eq!(a.span_type(), b.span_type());
            prop_assert_eq!(a.status, b.status);
        }

        // parents always precede their children
        for (index, span) in back.spans.iter().enumerate() {
            if let Some(parent) = &span.parent_span_id {
                let parent_index = back.spans.iter().position(|s| &s.span_id == parent);
                prop_assert!(parent_index.map_or(false, |p| p < index));
            }
        }
    }
}
