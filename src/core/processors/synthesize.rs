use tracing::debug;

use super::{AlgorithmDraft, JobProcessors, numbered};
use crate::core::error::AutomationError;
use crate::core::store::types::AlgorithmRecord;

const MIN_PARENTS: usize = 2;
const MAX_PARENTS: usize = 3;

fn describe_parent(index: usize, algo: &AlgorithmRecord) -> String {
    format!(
        "## Parent {index}: {name} (id {id})\n\
         Inspiration: {inspiration}\n\
         Domain: {domain}\n\
         Description: {description}\n\
         Principle: {principle}\n\
         Steps:\n{steps}\n",
        index = index + 1,
        name = algo.name,
        id = algo.id,
        inspiration = algo.inspiration,
        domain = algo.domain,
        description = algo.description,
        principle = algo.principle,
        steps = numbered(&algo.steps),
    )
}

fn synthesis_prompt(parents: &[AlgorithmRecord]) -> String {
    let described: Vec<String> = parents
        .iter()
        .enumerate()
        .map(|(i, a)| describe_parent(i, a))
        .collect();
    format!(
        "You are an expert in bio-inspired computing.\n\
         Combine the following {count} algorithms into one hybrid algorithm that keeps the \
         strongest mechanism of each and resolves their conflicts.\n\n\
         {parents}\n\
         Respond with a single JSON object with the fields: name, inspiration, domain, \
         description, principle, steps, applications, pseudoCode, tags.",
        count = parents.len(),
        parents = described.join("\n"),
    )
}

impl JobProcessors {
    /// Fuse two or three parent algorithms into a hybrid draft.
    pub async fn synthesize(
        &self,
        parents: &[AlgorithmRecord],
    ) -> Result<AlgorithmDraft, AutomationError> {
        if !(MIN_PARENTS..=MAX_PARENTS).contains(&parents.len()) {
            return Err(AutomationError::ValidationFailed(format!(
                "synthesis needs {}-{} parents, got {}",
                MIN_PARENTS,
                MAX_PARENTS,
                parents.len()
            )));
        }
        let mut ids: Vec<i64> = parents.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != parents.len() {
            return Err(AutomationError::ValidationFailed(
                "synthesis parents must be distinct".into(),
            ));
        }

        debug!("Synthesizing hybrid from parents {:?}", ids);
        self.draft_from("synthesize", &synthesis_prompt(parents))
            .await
    }
}
