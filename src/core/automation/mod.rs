//! Scheduled driver for the generate, synthesize and improve tasks.
//!
//! A run processes work items strictly one at a time with a configurable
//! pause between items. Each item is isolated: a failure is written to the
//! automation log and the run moves on to the next item.

mod generate;
mod improve;
mod synthesize;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::config::AutomationConfig;
use crate::core::error::AutomationError;
use crate::core::processors::JobProcessors;
use crate::core::store::Store;
use crate::core::store::types::{LogStatus, NewLogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Generate,
    Synthesize,
    Improve,
    FullCycle,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Generate => "generate",
            TaskKind::Synthesize => "synthesize",
            TaskKind::Improve => "improve",
            TaskKind::FullCycle => "full_cycle",
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(TaskKind::Generate),
            "synthesize" => Ok(TaskKind::Synthesize),
            "improve" => Ok(TaskKind::Improve),
            "full" | "full_cycle" | "cycle" => Ok(TaskKind::FullCycle),
            other => Err(format!(
                "unknown task '{}' (expected generate, synthesize, improve or full)",
                other
            )),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task: TaskKind,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The task had nothing to do.
    pub skipped: bool,
    /// Set when the task could not select its work items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskSummary {
    fn new(task: TaskKind) -> Self {
        Self {
            task,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: false,
            error: None,
        }
    }

    fn aborted(task: TaskKind, err: &AutomationError) -> Self {
        warn!("{} task aborted: {}", task, err);
        Self {
            error: Some(err.to_string()),
            ..Self::new(task)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub trigger: TaskKind,
    pub tasks: Vec<TaskSummary>,
    pub started_at: u64,
    pub finished_at: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct AutomationOrchestrator {
    store: Store,
    processors: Arc<JobProcessors>,
    config: AutomationConfig,
    rng: Mutex<StdRng>,
    running: AtomicBool,
    last_report: RwLock<Option<RunReport>>,
}

/// Exclusive right to execute one run. Dropping it frees the orchestrator.
pub struct RunPermit {
    orchestrator: Arc<AutomationOrchestrator>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.orchestrator.running.store(false, Ordering::SeqCst);
    }
}

impl RunPermit {
    pub async fn run(self, kind: TaskKind) -> RunReport {
        self.orchestrator.execute(kind).await
    }
}

impl AutomationOrchestrator {
    pub fn new(store: Store, processors: Arc<JobProcessors>, config: AutomationConfig) -> Self {
        Self::with_rng_source(store, processors, config, StdRng::from_entropy())
    }

    #[cfg(test)]
    pub fn with_seed(
        store: Store,
        processors: Arc<JobProcessors>,
        config: AutomationConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng_source(store, processors, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng_source(
        store: Store,
        processors: Arc<JobProcessors>,
        config: AutomationConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            processors,
            config,
            rng: Mutex::new(rng),
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    /// Claim the single run slot, or fail with `Busy` if a run is in progress.
    pub fn acquire(self: &Arc<Self>) -> Result<RunPermit, AutomationError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AutomationError::Busy)?;
        Ok(RunPermit {
            orchestrator: Arc::clone(self),
        })
    }

    pub async fn trigger(self: &Arc<Self>, kind: TaskKind) -> Result<RunReport, AutomationError> {
        let permit = self.acquire()?;
        Ok(permit.run(kind).await)
    }

    async fn execute(&self, kind: TaskKind) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = unix_now();
        info!("Automation run {} started ({})", run_id, kind);

        let mut tasks = Vec::new();
        match kind {
            TaskKind::Generate => tasks.push(self.run_generate().await),
            TaskKind::Synthesize => tasks.push(self.run_synthesize().await),
            TaskKind::Improve => tasks.push(self.run_improve().await),
            TaskKind::FullCycle => {
                tasks.push(self.run_generate().await);
                tasks.push(self.run_synthesize().await);
                tasks.push(self.run_improve().await);
            }
        }

        for task in &tasks {
            info!(
                "  {}: {} attempted, {} succeeded, {} failed{}",
                task.task,
                task.attempted,
                task.succeeded,
                task.failed,
                if task.skipped { " (skipped)" } else { "" }
            );
        }

        let report = RunReport {
            run_id,
            trigger: kind,
            tasks,
            started_at,
            finished_at: unix_now(),
        };
        info!("Automation run {} finished", report.run_id);
        *self.last_report.write().await = Some(report.clone());
        report
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    /// Throttle between work items; the first item starts immediately.
    async fn pause(index: usize, delay_ms: u64) {
        if index > 0 && delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Best-effort log write; a failure here never fails the item.
    async fn record(
        &self,
        task: TaskKind,
        status: LogStatus,
        details: Value,
        algorithm_id: Option<i64>,
    ) {
        let entry = NewLogEntry {
            task_type: task.as_str().to_string(),
            status,
            details,
            algorithm_id,
        };
        if let Err(e) = self.store.append_log(&entry).await {
            warn!("Failed to write {} automation log entry: {}", task, e);
        }
    }

    async fn record_failure(
        &self,
        task: TaskKind,
        err: &AutomationError,
        context: Value,
        algorithm_id: Option<i64>,
    ) {
        warn!("{} item failed: {}", task, err);
        let mut details = err.log_details();
        if let (Some(target), Value::Object(extra)) = (details.as_object_mut(), context) {
            target.extend(extra);
        }
        self.record(task, LogStatus::Failed, details, algorithm_id)
            .await;
    }
}

fn success_details(name: &str, extra: Value) -> Value {
    let mut details = json!({ "name": name });
    if let (Some(target), Value::Object(extra)) = (details.as_object_mut(), extra) {
        target.extend(extra);
    }
    details
}

#[cfg(test)]
mod tests;
