mod improve;
mod run_guard;

use std::sync::Arc;

use crate::core::automation::AutomationOrchestrator;
use crate::core::config::AutomationConfig;
use crate::core::llm::retry::ProviderError;
use crate::core::llm::testing::{ScriptHandle, scripted_manager};
use crate::core::processors::JobProcessors;
use crate::core::store::Store;
use crate::core::store::types::{AlgorithmKind, NewAlgorithm};

pub(super) fn test_config() -> AutomationConfig {
    let mut config = AutomationConfig::default();
    config.generate.delay_ms = 0;
    config.generate.existing_problem_ratio = 1.0;
    config.synthesize.delay_ms = 0;
    config.improve.delay_ms = 0;
    config
}

pub(super) fn orchestrator_with(
    config: AutomationConfig,
    outcomes: Vec<Result<String, ProviderError>>,
) -> (Arc<AutomationOrchestrator>, Store, ScriptHandle) {
    let (llm, handle) = scripted_manager(outcomes);
    let store = Store::open_in_memory();
    let processors = Arc::new(JobProcessors::new(Arc::new(llm), store.clone()));
    let orchestrator = AutomationOrchestrator::with_seed(store.clone(), processors, config, 7);
    (Arc::new(orchestrator), store, handle)
}

pub(super) fn draft_json(name: &str) -> Result<String, ProviderError> {
    Ok(format!(
        r#"{{"name":"{name}","description":"{name} in detail","principle":"feedback",
            "steps":"sense, decide, act","pseudoCode":"loop {{ step() }}","tags":["bio"]}}"#
    ))
}

pub(super) async fn seed_algorithm(store: &Store, name: &str) -> i64 {
    store
        .insert_algorithm(&NewAlgorithm {
            name: name.to_string(),
            inspiration: format!("{name} inspiration"),
            domain: "Robotics".into(),
            description: format!("{name} description"),
            principle: "local rules".into(),
            steps: vec!["observe".into(), "move".into()],
            applications: vec![],
            pseudo_code: "move()".into(),
            tags: vec![],
            kind: AlgorithmKind::Generated,
            parent_ids: None,
        })
        .await
        .unwrap()
}
