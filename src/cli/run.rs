use anyhow::{Result, bail};
use console::style;

use super::build_runtime;
use crate::core::automation::{RunReport, TaskKind};
use crate::core::config::AppConfig;
use crate::core::terminal::{print_status, print_step, print_success, print_warn};

fn print_report(report: &RunReport) {
    for task in &report.tasks {
        let line = if task.skipped {
            style("nothing to do").dim().to_string()
        } else {
            format!(
                "{} attempted, {} succeeded, {} failed",
                task.attempted,
                style(task.succeeded).green(),
                style(task.failed).red()
            )
        };
        print_status(task.task.as_str(), &line);
        if let Some(err) = &task.error {
            print_warn(&format!("{} aborted: {}", task.task, err));
        }
    }
}

/// Run one task (or the full cycle) in the foreground and print its summary.
pub async fn run_task(config: &AppConfig, kind: TaskKind) -> Result<()> {
    let runtime = build_runtime(config).await?;
    print_step(&format!("Running {}...", kind));

    let report = runtime.orchestrator.trigger(kind).await?;
    print_report(&report);

    let failed: usize = report.tasks.iter().map(|t| t.failed).sum();
    let aborted = report.tasks.iter().any(|t| t.error.is_some());
    if aborted {
        bail!("Run {} did not complete every task", report.run_id);
    }
    if failed > 0 {
        print_warn(&format!(
            "{} item(s) failed; see `biosynth logs` for details",
            failed
        ));
    } else {
        print_success(&format!("Run {} finished", report.run_id));
    }
    Ok(())
}
