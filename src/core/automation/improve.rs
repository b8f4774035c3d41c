use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

use super::{AutomationOrchestrator, TaskKind, TaskSummary};
use crate::core::error::AutomationError;
use crate::core::store::types::{AlgorithmRecord, AnalysisMode, LogStatus};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

impl AutomationOrchestrator {
    pub(super) async fn run_improve(&self) -> TaskSummary {
        let cfg = &self.config.improve;
        let mut summary = TaskSummary::new(TaskKind::Improve);

        let stale_after = Duration::from_secs(cfg.stale_after_days.saturating_mul(SECONDS_PER_DAY));
        let candidates = match self
            .store
            .algorithms_needing_analysis(cfg.limit, stale_after)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => return TaskSummary::aborted(TaskKind::Improve, &e.into()),
        };
        if candidates.is_empty() {
            debug!("No algorithms due for analysis");
            summary.skipped = true;
            return summary;
        }
        info!("Reviewing {} algorithms", candidates.len());

        for (index, algo) in candidates.iter().enumerate() {
            Self::pause(index, cfg.delay_ms).await;
            summary.attempted += 1;

            match self.review_one(algo).await {
                Ok(Some(details)) => {
                    summary.succeeded += 1;
                    self.record(
                        TaskKind::Improve,
                        LogStatus::AnalysisComplete,
                        details,
                        Some(algo.id),
                    )
                    .await;
                }
                Ok(None) => {
                    summary.succeeded += 1;
                    debug!("Algorithm {} has no high-severity risks", algo.id);
                }
                Err(e) => {
                    summary.failed += 1;
                    let context = json!({ "name": algo.name });
                    self.record_failure(TaskKind::Improve, &e, context, Some(algo.id))
                        .await;
                }
            }
        }
        summary
    }

    /// Blind-spot review, followed by an extension pass when any risk is high.
    /// Returns the log details when both passes ran.
    async fn review_one(&self, algo: &AlgorithmRecord) -> Result<Option<Value>, AutomationError> {
        let blind_spot = self
            .processors
            .analyze(algo, AnalysisMode::BlindSpot)
            .await?;
        let high_risks = blind_spot.high_severity_risks();
        if high_risks == 0 {
            return Ok(None);
        }

        info!(
            "Algorithm {} has {} high-severity risk(s); running extension analysis",
            algo.id, high_risks
        );
        let extension = self
            .processors
            .analyze(algo, AnalysisMode::Extension)
            .await?;
        Ok(Some(json!({
            "name": algo.name,
            "blindSpotAnalysisId": blind_spot.analysis_id,
            "extensionAnalysisId": extension.analysis_id,
            "highRisks": high_risks,
        })))
    }
}
