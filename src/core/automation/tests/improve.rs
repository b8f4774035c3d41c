use super::{orchestrator_with, seed_algorithm, test_config};
use crate::core::llm::retry::ProviderError;
use crate::core::store::types::{AnalysisMode, LogStatus};

const HIGH_RISK: &str = r#"{"risks":[{"risk":"premature convergence","severity":"High"},
    {"risk":"parameter tuning","severity":"Medium"}],"summary":"fragile"}"#;
const LOW_RISK: &str = r#"{"risks":[{"risk":"slow start","severity":"Low"}]}"#;
const EXTENSION: &str = r#"{"extensions":[{"title":"restarts","description":"diversify"}]}"#;

#[tokio::test]
async fn high_severity_risk_triggers_extension_and_one_log_entry() {
    let (orchestrator, store, handle) = orchestrator_with(
        test_config(),
        vec![Ok(HIGH_RISK.into()), Ok(EXTENSION.into())],
    );
    let id = seed_algorithm(&store, "Swarm Sweep").await;

    let summary = orchestrator.run_improve().await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(handle.calls(), 2);

    let analyses = store.analyses_for(id).await.unwrap();
    let modes: Vec<_> = analyses.iter().map(|a| a.mode).collect();
    assert_eq!(modes, vec![AnalysisMode::Extension, AnalysisMode::BlindSpot]);

    let logs = store.list_logs(10, Some("improve")).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::AnalysisComplete);
    assert_eq!(logs[0].algorithm_id, Some(id));
    assert_eq!(logs[0].details["highRisks"], 1);
    assert_eq!(logs[0].details["blindSpotAnalysisId"], analyses[1].id);
    assert_eq!(logs[0].details["extensionAnalysisId"], analyses[0].id);
}

#[tokio::test]
async fn no_high_risk_means_no_log_entry() {
    let (orchestrator, store, handle) = orchestrator_with(test_config(), vec![Ok(LOW_RISK.into())]);
    let id = seed_algorithm(&store, "Calm Colony").await;

    let summary = orchestrator.run_improve().await;
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(handle.calls(), 1);
    assert_eq!(store.analyses_for(id).await.unwrap().len(), 1);
    assert!(store.list_logs(10, None).await.unwrap().is_empty());

    // Freshly analyzed algorithms are not picked up again.
    let again = orchestrator.run_improve().await;
    assert!(again.skipped);
    assert_eq!(handle.calls(), 1);
}

#[tokio::test]
async fn credential_failure_is_logged_as_terminal_and_later_items_still_run() {
    let (orchestrator, store, handle) = orchestrator_with(
        test_config(),
        vec![
            Err(ProviderError::http(401, "API key not valid", None)),
            Ok(LOW_RISK.into()),
        ],
    );
    let first = seed_algorithm(&store, "First").await;
    seed_algorithm(&store, "Second").await;

    let summary = orchestrator.run_improve().await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(handle.calls(), 2);

    let logs = store.list_logs(10, Some("improve")).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Failed);
    assert_eq!(logs[0].algorithm_id, Some(first));
    assert_eq!(logs[0].details["terminal"], true);
    assert_eq!(logs[0].details["aiErrorKind"], "invalid_credential");
}

#[tokio::test]
async fn improve_respects_the_limit() {
    let mut config = test_config();
    config.improve.limit = 2;
    let (orchestrator, store, handle) = orchestrator_with(
        config,
        vec![Ok(LOW_RISK.into()), Ok(LOW_RISK.into()), Ok(LOW_RISK.into())],
    );
    for name in ["A", "B", "C"] {
        seed_algorithm(&store, name).await;
    }

    let summary = orchestrator.run_improve().await;
    assert_eq!(summary.attempted, 2);
    assert_eq!(handle.calls(), 2);
}

#[tokio::test]
async fn a_failing_algorithm_does_not_block_the_next_review() {
    let mut config = test_config();
    config.improve.limit = 1;
    let (orchestrator, store, handle) = orchestrator_with(
        config,
        vec![
            Err(ProviderError::http(500, "upstream exploded", None)),
            Ok(LOW_RISK.into()),
        ],
    );
    let stuck = seed_algorithm(&store, "Stuck").await;
    let next = seed_algorithm(&store, "Next").await;

    let first = orchestrator.run_improve().await;
    assert_eq!(first.failed, 1);

    let second = orchestrator.run_improve().await;
    assert_eq!(second.succeeded, 1);
    assert_eq!(handle.calls(), 2);
    assert!(store.analyses_for(stuck).await.unwrap().is_empty());
    assert_eq!(store.analyses_for(next).await.unwrap().len(), 1);
}
