use super::{draft_json, orchestrator_with, test_config};
use crate::core::automation::TaskKind;
use crate::core::error::ErrorKind;
use crate::core::store::types::{NewProblem, ProblemPriority};

#[tokio::test]
async fn second_trigger_is_rejected_while_a_run_holds_the_slot() {
    let (orchestrator, _, handle) = orchestrator_with(test_config(), vec![]);

    let permit = orchestrator.acquire().expect("slot is free");
    assert!(orchestrator.is_running());
    let err = orchestrator.trigger(TaskKind::Improve).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(handle.calls(), 0);

    drop(permit);
    assert!(!orchestrator.is_running());
    let report = orchestrator.trigger(TaskKind::Improve).await.unwrap();
    assert!(report.tasks[0].skipped);
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn full_cycle_runs_tasks_in_order_and_keeps_the_report() {
    let mut config = test_config();
    config.generate.min_items = 1;
    config.generate.max_items = 1;
    let (orchestrator, store, handle) = orchestrator_with(config, vec![draft_json("Only Child")]);
    store
        .add_problem(&NewProblem {
            title: "Wildfire spread".into(),
            description: "predict fronts".into(),
            domain: "Environmental Monitoring".into(),
            priority: ProblemPriority::Critical,
        })
        .await
        .unwrap();
    assert!(orchestrator.last_report().await.is_none());

    let report = orchestrator.trigger(TaskKind::FullCycle).await.unwrap();
    let order: Vec<_> = report.tasks.iter().map(|t| t.task).collect();
    assert_eq!(
        order,
        vec![TaskKind::Generate, TaskKind::Synthesize, TaskKind::Improve]
    );
    assert_eq!(report.tasks[0].succeeded, 1);
    // One algorithm is not enough to synthesize.
    assert!(report.tasks[1].skipped);
    // The new algorithm is reviewed; the script is exhausted so the review fails.
    assert_eq!(report.tasks[2].failed, 1);
    assert_eq!(handle.calls(), 2);
    assert!(report.finished_at >= report.started_at);

    let stored = orchestrator.last_report().await.expect("report kept");
    assert_eq!(stored.run_id, report.run_id);
}

#[test]
fn task_names_parse_leniently() {
    assert_eq!("Full".parse::<TaskKind>(), Ok(TaskKind::FullCycle));
    assert_eq!("full_cycle".parse::<TaskKind>(), Ok(TaskKind::FullCycle));
    assert_eq!(" improve ".parse::<TaskKind>(), Ok(TaskKind::Improve));
    assert!("everything".parse::<TaskKind>().is_err());
}
