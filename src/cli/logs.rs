use anyhow::Result;
use console::style;

use super::LogsArgs;
use crate::core::config::AppConfig;
use crate::core::store::Store;
use crate::core::store::types::{AutomationLogEntry, LogStatus};
use crate::core::terminal::print_info;

fn status_label(status: LogStatus) -> String {
    match status {
        LogStatus::Success => style(status.as_str()).green().to_string(),
        LogStatus::Failed => style(status.as_str()).red().to_string(),
        LogStatus::AnalysisComplete => style(status.as_str()).cyan().to_string(),
    }
}

fn summarize(entry: &AutomationLogEntry) -> String {
    let name = entry.details.get("name").and_then(|v| v.as_str());
    let error = entry.details.get("error").and_then(|v| v.as_str());
    match (name, error) {
        (_, Some(error)) => error.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => entry.details.to_string(),
    }
}

pub async fn show_logs(config: &AppConfig, args: LogsArgs) -> Result<()> {
    let store = Store::open(config.database_path()).await?;
    let entries = store.list_logs(args.limit, args.task.as_deref()).await?;
    if entries.is_empty() {
        print_info("No automation log entries yet.");
        return Ok(());
    }

    for entry in &entries {
        let algorithm = entry
            .algorithm_id
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<10} {:<28} {:>6}  {}",
            style(&entry.created_at).dim(),
            entry.task_type,
            status_label(entry.status),
            algorithm,
            summarize(entry)
        );
    }
    Ok(())
}
