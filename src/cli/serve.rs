use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::info;

use super::build_runtime;
use crate::core::automation::{AutomationOrchestrator, TaskKind};
use crate::core::config::AppConfig;
use crate::core::error::AutomationError;
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal;
use crate::interfaces::web::{ApiServer, ApiServerConfig};

/// Scheduled full cycle. A tick that lands while a run is in progress is skipped.
async fn scheduled_cycle(orchestrator: Arc<AutomationOrchestrator>) {
    match orchestrator.trigger(TaskKind::FullCycle).await {
        Ok(report) => info!("Scheduled run {} complete", report.run_id),
        Err(AutomationError::Busy) => info!("Scheduled run skipped: a run is already in progress"),
        Err(e) => tracing::error!("Scheduled run failed: {}", e),
    }
}

pub async fn run_serve(config: AppConfig, log_tx: broadcast::Sender<String>) -> Result<()> {
    info!("Starting biosynth automation service...");
    let runtime = build_runtime(&config).await?;
    let (provider, model) = runtime.processors.llm().active_info();
    info!("Using {:?} model {}", provider, model);

    let mut lifecycle = LifecycleManager::new().await?;
    lifecycle.attach(Arc::new(Mutex::new(runtime.store.clone())));

    let api_server = ApiServer::new(ApiServerConfig {
        orchestrator: runtime.orchestrator.clone(),
        processors: runtime.processors.clone(),
        store: runtime.store.clone(),
        log_tx,
        api_host: config.server.host.clone(),
        api_port: config.server.port,
        admin_token: config.server.admin_token.clone(),
    });
    lifecycle.attach(Arc::new(Mutex::new(api_server)));

    if config.automation.enabled {
        let orchestrator = runtime.orchestrator.clone();
        let job = tokio_cron_scheduler::Job::new_async(
            config.automation.schedule.as_str(),
            move |_uuid, mut _l| {
                let orchestrator = orchestrator.clone();
                Box::pin(async move {
                    scheduled_cycle(orchestrator).await;
                })
            },
        )
        .with_context(|| {
            format!(
                "Invalid automation.schedule '{}'",
                config.automation.schedule
            )
        })?;
        lifecycle.scheduler.add(job).await?;
        info!(
            "Automation scheduled with cron '{}'",
            config.automation.schedule
        );
    } else {
        info!("Scheduled automation disabled; runs start only on trigger");
    }

    lifecycle.start().await?;

    let base = format!("http://{}:{}", config.server.host, config.server.port);
    terminal::print_success("biosynth is running");
    terminal::print_link("API", &format!("{}/api", base));
    terminal::print_link("Live logs", &format!("{}/api/automation/logs/stream", base));
    if config.automation.enabled {
        terminal::print_status("Schedule", &config.automation.schedule);
    }
    if config.server.admin_token.is_none() {
        terminal::print_warn("No admin token set; the API is open to loopback clients only.");
    }
    info!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down biosynth from {:?} state...", lifecycle.state());
    lifecycle.shutdown().await?;

    Ok(())
}
