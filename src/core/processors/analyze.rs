use tracing::{debug, info};

use super::{AnalysisOutcome, JobProcessors, numbered, schema};
use crate::core::error::AutomationError;
use crate::core::store::types::{AlgorithmRecord, AnalysisMode};

fn analysis_prompt(algo: &AlgorithmRecord, mode: AnalysisMode) -> String {
    let task = match mode {
        AnalysisMode::Sanity => {
            "Check this algorithm for internal consistency: do the steps implement the stated \
             principle, is the pseudocode coherent, are the applications plausible? \
             Respond with a JSON object with the fields: verdict, score (0-10), issues, \
             strengths, summary."
        }
        AnalysisMode::BlindSpot => {
            "Identify blind spots: failure modes, hidden assumptions, scaling limits and \
             situations where the biological analogy breaks down. Rate each risk's severity \
             as Low, Medium or High. Respond with a JSON object with the fields: risks \
             (array of {risk, severity, mitigation}) and summary."
        }
        AnalysisMode::Extension => {
            "Propose concrete extensions that would remove the algorithm's most severe \
             weaknesses or widen its applicability. Respond with a JSON object with the \
             fields: extensions (array of {title, description, addresses}) and summary."
        }
    };
    format!(
        "You are reviewing a bio-inspired algorithm.\n\n\
         Name: {name}\n\
         Inspiration: {inspiration}\n\
         Domain: {domain}\n\
         Description: {description}\n\
         Principle: {principle}\n\
         Steps:\n{steps}\n\
         Pseudocode:\n{pseudo}\n\n\
         {task}",
        name = algo.name,
        inspiration = algo.inspiration,
        domain = algo.domain,
        description = algo.description,
        principle = algo.principle,
        steps = numbered(&algo.steps),
        pseudo = algo.pseudo_code,
        task = task,
    )
}

impl JobProcessors {
    /// Run one analysis mode and persist the result as an analysis row.
    pub async fn analyze(
        &self,
        algo: &AlgorithmRecord,
        mode: AnalysisMode,
    ) -> Result<AnalysisOutcome, AutomationError> {
        let schema = match mode {
            AnalysisMode::Sanity => schema::sanity_schema(),
            AnalysisMode::BlindSpot => schema::blind_spot_schema(),
            AnalysisMode::Extension => schema::extension_schema(),
        };
        debug!("Running {} analysis on algorithm {}", mode, algo.id);

        let result = self
            .llm
            .generate_json(&analysis_prompt(algo, mode), &schema)
            .await?;
        if !result.is_object() {
            return Err(AutomationError::ValidationFailed(format!(
                "{} analysis did not return an object",
                mode
            )));
        }

        let analysis_id = self.store.save_analysis(algo.id, mode, &result).await?;
        info!(
            "Stored {} analysis {} for algorithm {}",
            mode, analysis_id, algo.id
        );
        Ok(AnalysisOutcome {
            analysis_id,
            mode,
            result,
        })
    }
}
