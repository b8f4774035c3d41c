use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{AutomationOrchestrator, TaskKind, TaskSummary, success_details};
use crate::core::error::AutomationError;
use crate::core::processors::{GenerationRequest, ProblemSeed};
use crate::core::store::types::{AlgorithmKind, LogStatus, ProblemRecord};

const INSPIRATIONS: &[&str] = &[
    "ant colony foraging trails",
    "honeybee waggle dance recruitment",
    "slime mould network growth",
    "bacterial quorum sensing",
    "immune system clonal selection",
    "bird flock alignment",
    "firefly flash synchronization",
    "termite mound ventilation",
    "octopus distributed arm control",
    "mycorrhizal nutrient sharing",
    "bat echolocation",
    "gene regulatory networks",
];

const FALLBACK_SEEDS: &[(&str, &str, &str)] = &[
    (
        "Adaptive traffic signal timing",
        "Coordinate city intersections to cut average wait times under shifting demand.",
        "Transportation",
    ),
    (
        "Microgrid load balancing",
        "Match intermittent renewable supply with household demand without central control.",
        "Energy Systems",
    ),
    (
        "Early outbreak detection",
        "Spot emerging disease clusters from sparse and noisy clinic reports.",
        "Healthcare",
    ),
    (
        "Warehouse robot routing",
        "Route hundreds of robots through shared aisles without deadlock.",
        "Logistics",
    ),
    (
        "Network intrusion detection",
        "Flag novel attack patterns in high-volume traffic with few labelled examples.",
        "Cybersecurity",
    ),
    (
        "Precision irrigation scheduling",
        "Distribute limited water across fields with heterogeneous soil moisture.",
        "Agriculture",
    ),
];

impl From<&ProblemRecord> for ProblemSeed {
    fn from(problem: &ProblemRecord) -> Self {
        ProblemSeed {
            title: problem.title.clone(),
            description: problem.description.clone(),
            domain: problem.domain.clone(),
            problem_id: Some(problem.id),
        }
    }
}

/// `count` picks from `pool`: distinct while the pool lasts, then repeats.
fn pick<T: Clone>(pool: &[T], count: usize, rng: &mut StdRng) -> Vec<T> {
    let mut picked: Vec<T> = pool
        .choose_multiple(rng, count.min(pool.len()))
        .cloned()
        .collect();
    while picked.len() < count {
        match pool.choose(rng) {
            Some(item) => picked.push(item.clone()),
            None => break,
        }
    }
    picked
}

fn fallback_seeds(count: usize, rng: &mut StdRng) -> Vec<ProblemSeed> {
    pick(FALLBACK_SEEDS, count, rng)
        .into_iter()
        .map(|(title, description, domain)| ProblemSeed {
            title: title.to_string(),
            description: description.to_string(),
            domain: domain.to_string(),
            problem_id: None,
        })
        .collect()
}

impl AutomationOrchestrator {
    pub(super) async fn run_generate(&self) -> TaskSummary {
        let cfg = &self.config.generate;
        let count = self.with_rng(|rng| rng.gen_range(cfg.min_items..=cfg.max_items));
        self.run_generate_batch(count).await
    }

    pub(super) async fn run_generate_batch(&self, count: usize) -> TaskSummary {
        let mut summary = TaskSummary::new(TaskKind::Generate);
        let seeds = match self.select_seeds(count).await {
            Ok(seeds) => seeds,
            Err(e) => return TaskSummary::aborted(TaskKind::Generate, &e),
        };
        if seeds.is_empty() {
            summary.skipped = true;
            return summary;
        }
        info!("Generating {} algorithms", seeds.len());

        for (index, seed) in seeds.iter().enumerate() {
            Self::pause(index, self.config.generate.delay_ms).await;
            summary.attempted += 1;

            let inspiration = self.with_rng(|rng| {
                INSPIRATIONS
                    .choose(rng)
                    .copied()
                    .unwrap_or("ant colony foraging trails")
            });
            let context = json!({
                "problem": seed.title,
                "problemId": seed.problem_id,
                "domain": seed.domain,
                "inspiration": inspiration,
            });

            match self.generate_one(seed, inspiration).await {
                Ok((id, name)) => {
                    summary.succeeded += 1;
                    info!("Generated algorithm {} '{}'", id, name);
                    self.record(
                        TaskKind::Generate,
                        LogStatus::Success,
                        success_details(&name, context),
                        Some(id),
                    )
                    .await;
                }
                Err(e) => {
                    summary.failed += 1;
                    self.record_failure(TaskKind::Generate, &e, context, None)
                        .await;
                }
            }
        }
        summary
    }

    /// The seed source is decided once per run: open high-priority problems
    /// with the configured probability, otherwise freshly invented ones.
    async fn select_seeds(&self, count: usize) -> Result<Vec<ProblemSeed>, AutomationError> {
        let cfg = &self.config.generate;
        let use_existing =
            self.with_rng(|rng| rng.gen_bool(cfg.existing_problem_ratio.clamp(0.0, 1.0)));

        if use_existing {
            let pool = self.store.recent_open_problems(cfg.recent_problem_pool).await?;
            if !pool.is_empty() {
                let seeds: Vec<ProblemSeed> = pool.iter().map(ProblemSeed::from).collect();
                return Ok(self.with_rng(|rng| pick(&seeds, count, rng)));
            }
            debug!("No open high-priority problems; inventing seeds instead");
        }
        Ok(self.invent_seeds(count).await)
    }

    async fn invent_seeds(&self, count: usize) -> Vec<ProblemSeed> {
        let mut seeds = match self
            .processors
            .propose_problem_seeds(&self.config.generate.domains, count)
            .await
        {
            Ok(seeds) => seeds,
            Err(e) => {
                warn!("Problem proposal failed, using built-in seeds: {}", e);
                Vec::new()
            }
        };
        if seeds.len() < count {
            let missing = count - seeds.len();
            seeds.extend(self.with_rng(|rng| fallback_seeds(missing, rng)));
        }
        seeds
    }

    async fn generate_one(
        &self,
        seed: &ProblemSeed,
        inspiration: &str,
    ) -> Result<(i64, String), AutomationError> {
        let request = GenerationRequest {
            inspiration: inspiration.to_string(),
            domain: seed.domain.clone(),
            problem: Some(format!("{}: {}", seed.title, seed.description)),
        };
        let draft = self.processors.generate(&request).await?;
        let algo = draft.into_new_algorithm(
            AlgorithmKind::Generated,
            None,
            &request.inspiration,
            &request.domain,
        )?;
        let id = self.store.insert_algorithm(&algo).await?;
        Ok((id, algo.name))
    }
}
