use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::json;
use tracing::info;

use super::{AutomationOrchestrator, TaskKind, TaskSummary, success_details};
use crate::core::error::AutomationError;
use crate::core::store::types::{AlgorithmKind, AlgorithmRecord, LogStatus};

impl AutomationOrchestrator {
    pub(super) async fn run_synthesize(&self) -> TaskSummary {
        let cfg = &self.config.synthesize;
        let mut summary = TaskSummary::new(TaskKind::Synthesize);

        let pool = match self.store.top_algorithms(cfg.top_k).await {
            Ok(pool) => pool,
            Err(e) => return TaskSummary::aborted(TaskKind::Synthesize, &e.into()),
        };
        if pool.len() < 2 {
            info!(
                "Skipping synthesis: {} algorithm(s) available, need at least 2",
                pool.len()
            );
            summary.skipped = true;
            return summary;
        }

        let iterations = self.with_rng(|rng| rng.gen_range(cfg.min_iterations..=cfg.max_iterations));
        info!(
            "Synthesizing {} hybrids from a pool of {}",
            iterations,
            pool.len()
        );

        for index in 0..iterations {
            Self::pause(index, cfg.delay_ms).await;
            summary.attempted += 1;

            let parents: Vec<AlgorithmRecord> = self.with_rng(|rng| {
                let wanted = rng
                    .gen_range(cfg.min_parents..=cfg.max_parents)
                    .min(pool.len());
                pool.choose_multiple(rng, wanted).cloned().collect()
            });
            let parent_ids: Vec<i64> = parents.iter().map(|p| p.id).collect();
            let context = json!({ "parentIds": parent_ids });

            match self.synthesize_one(&parents, parent_ids.clone()).await {
                Ok((id, name)) => {
                    summary.succeeded += 1;
                    info!("Synthesized hybrid {} '{}' from {:?}", id, name, parent_ids);
                    self.record(
                        TaskKind::Synthesize,
                        LogStatus::Success,
                        success_details(&name, context),
                        Some(id),
                    )
                    .await;
                }
                Err(e) => {
                    summary.failed += 1;
                    self.record_failure(TaskKind::Synthesize, &e, context, None)
                        .await;
                }
            }
        }
        summary
    }

    async fn synthesize_one(
        &self,
        parents: &[AlgorithmRecord],
        parent_ids: Vec<i64>,
    ) -> Result<(i64, String), AutomationError> {
        let draft = self.processors.synthesize(parents).await?;
        let inspiration = parents
            .iter()
            .map(|p| p.inspiration.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" + ");
        let domain = parents.first().map(|p| p.domain.as_str()).unwrap_or_default();

        let algo =
            draft.into_new_algorithm(AlgorithmKind::Hybrid, Some(parent_ids), &inspiration, domain)?;
        let id = self.store.insert_algorithm(&algo).await?;
        Ok((id, algo.name))
    }
}
