use serde_json::Value;
use tracing::{debug, warn};

use super::{AlgorithmDraft, GenerationRequest, JobProcessors, ProblemSeed, schema};
use crate::core::error::AutomationError;

fn generation_prompt(request: &GenerationRequest) -> String {
    let problem = match request.problem.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => format!("\nThe algorithm must address this problem:\n{}\n", p),
        _ => String::new(),
    };
    format!(
        "You are a computational biologist and algorithm designer.\n\
         Design a novel bio-inspired algorithm.\n\n\
         Biological inspiration: {inspiration}\n\
         Target domain: {domain}\n{problem}\n\
         Explain the biological principle you borrow, give concrete ordered steps, \
         realistic applications, concise pseudocode and a few short tags.\n\
         Respond with a single JSON object with the fields: name, inspiration, domain, \
         description, principle, steps, applications, pseudoCode, tags.",
        inspiration = request.inspiration.trim(),
        domain = request.domain.trim(),
        problem = problem,
    )
}

fn seeds_prompt(domains: &[String], count: usize) -> String {
    format!(
        "Propose {count} distinct, concrete and currently unsolved engineering or scientific \
         problems that a bio-inspired algorithm could help with.\n\
         Pick each problem's domain from this list: {domains}.\n\
         Respond with a JSON array of objects with the fields: title, description, domain.",
        count = count,
        domains = domains.join(", "),
    )
}

impl JobProcessors {
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<AlgorithmDraft, AutomationError> {
        if request.inspiration.trim().is_empty() || request.domain.trim().is_empty() {
            return Err(AutomationError::ValidationFailed(
                "inspiration and domain are required".into(),
            ));
        }
        debug!(
            "Generating algorithm: inspiration='{}' domain='{}'",
            request.inspiration, request.domain
        );
        self.draft_from("generate", &generation_prompt(request)).await
    }

    /// Ask the model to invent problem statements over a fixed domain menu.
    pub async fn propose_problem_seeds(
        &self,
        domains: &[String],
        count: usize,
    ) -> Result<Vec<ProblemSeed>, AutomationError> {
        let value = self
            .llm
            .generate_json(&seeds_prompt(domains, count), &schema::problem_seeds_schema())
            .await?;

        let items = match value {
            Value::Array(items) => items,
            // Some models wrap the list in an object.
            Value::Object(mut map) => match map.remove("problems") {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            },
            other => {
                return Err(AutomationError::ValidationFailed(format!(
                    "expected a list of problems, got {}",
                    other
                )));
            }
        };

        let mut seeds = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<ProblemSeed>(item) {
                Ok(seed) if !seed.title.trim().is_empty() => seeds.push(seed),
                Ok(_) => warn!("Dropping proposed problem with an empty title"),
                Err(e) => warn!("Dropping malformed proposed problem: {}", e),
            }
        }
        if seeds.is_empty() {
            return Err(AutomationError::ValidationFailed(
                "model proposed no usable problems".into(),
            ));
        }
        seeds.truncate(count);
        Ok(seeds)
    }
}
