use super::{AlgorithmDraft, JobProcessors, numbered};
use crate::core::error::AutomationError;
use crate::core::store::types::{AlgorithmRecord, AnalysisRecord};

fn improvement_prompt(algo: &AlgorithmRecord, analyses: &[AnalysisRecord]) -> String {
    let findings = if analyses.is_empty() {
        "(no prior analyses)".to_string()
    } else {
        analyses
            .iter()
            .map(|a| format!("### {} analysis ({})\n{}", a.mode, a.created_at, a.result))
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!(
        "Improve the following bio-inspired algorithm using the review findings below. \
         Keep what works, fix the weaknesses and state the changes in the description.\n\n\
         Name: {name}\n\
         Inspiration: {inspiration}\n\
         Domain: {domain}\n\
         Description: {description}\n\
         Principle: {principle}\n\
         Steps:\n{steps}\n\
         Applications:\n{applications}\n\
         Pseudocode:\n{pseudo}\n\n\
         Review findings:\n{findings}\n\n\
         Respond with a single JSON object with the fields: name, inspiration, domain, \
         description, principle, steps, applications, pseudoCode, tags.",
        name = algo.name,
        inspiration = algo.inspiration,
        domain = algo.domain,
        description = algo.description,
        principle = algo.principle,
        steps = numbered(&algo.steps),
        applications = numbered(&algo.applications),
        pseudo = algo.pseudo_code,
        findings = findings,
    )
}

impl JobProcessors {
    pub async fn improve(
        &self,
        algo: &AlgorithmRecord,
        analyses: &[AnalysisRecord],
    ) -> Result<AlgorithmDraft, AutomationError> {
        self.draft_from("improve", &improvement_prompt(algo, analyses))
            .await
    }
}
