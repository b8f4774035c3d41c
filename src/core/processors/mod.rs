//! Stateless job processors: each one builds a prompt, declares the expected
//! output shape and hands the call to the shared [`LlmManager`].
//!
//! Only `analyze` writes to the store; the others return drafts and leave
//! persistence to the caller.

mod analyze;
mod generate;
mod improve;
pub mod schema;
mod synthesize;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::core::error::AutomationError;
use crate::core::llm::LlmManager;
use crate::core::store::Store;
use crate::core::store::types::{AlgorithmKind, AnalysisMode, NewAlgorithm};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub inspiration: String,
    pub domain: String,
    #[serde(default)]
    pub problem: Option<String>,
}

/// Algorithm-shaped payload returned by the model. Fields the model omitted
/// stay empty; callers decide whether the draft is usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlgorithmDraft {
    pub name: Option<String>,
    pub inspiration: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub principle: Option<String>,
    pub steps: Vec<String>,
    pub applications: Vec<String>,
    #[serde(alias = "pseudo_code")]
    pub pseudo_code: Option<String>,
    pub tags: Vec<String>,
}

const REQUIRED_DRAFT_FIELDS: [&str; 5] = ["name", "description", "principle", "steps", "pseudoCode"];

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl AlgorithmDraft {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_DRAFT_FIELDS
            .into_iter()
            .filter(|field| match *field {
                "name" => blank(&self.name),
                "description" => blank(&self.description),
                "principle" => blank(&self.principle),
                "steps" => self.steps.is_empty(),
                "pseudoCode" => blank(&self.pseudo_code),
                _ => false,
            })
            .collect()
    }

    /// Convert into a persistable record. Name and description are the minimum
    /// a stored algorithm needs; inspiration and domain fall back to the
    /// request context when the model left them out.
    pub fn into_new_algorithm(
        self,
        kind: AlgorithmKind,
        parent_ids: Option<Vec<i64>>,
        fallback_inspiration: &str,
        fallback_domain: &str,
    ) -> Result<NewAlgorithm, AutomationError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AutomationError::ValidationFailed("draft has no name".into()))?;
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                AutomationError::ValidationFailed(format!("draft '{}' has no description", name))
            })?;

        Ok(NewAlgorithm {
            name: name.trim().to_string(),
            inspiration: self
                .inspiration
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback_inspiration.to_string()),
            domain: self
                .domain
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback_domain.to_string()),
            description,
            principle: self.principle.unwrap_or_default(),
            steps: self.steps,
            applications: self.applications,
            pseudo_code: self.pseudo_code.unwrap_or_default(),
            tags: self.tags,
            kind,
            parent_ids,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSeed {
    pub title: String,
    pub description: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub analysis_id: i64,
    pub mode: AnalysisMode,
    pub result: Value,
}

impl AnalysisOutcome {
    /// Number of entries in `risks` whose severity reads "high".
    pub fn high_severity_risks(&self) -> usize {
        self.result
            .get("risks")
            .and_then(Value::as_array)
            .map(|risks| {
                risks
                    .iter()
                    .filter(|risk| {
                        risk.get("severity")
                            .and_then(Value::as_str)
                            .is_some_and(|s| s.trim().eq_ignore_ascii_case("high"))
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

pub struct JobProcessors {
    llm: Arc<LlmManager>,
    store: Store,
}

impl JobProcessors {
    pub fn new(llm: Arc<LlmManager>, store: Store) -> Self {
        Self { llm, store }
    }

    pub fn llm(&self) -> &LlmManager {
        &self.llm
    }

    async fn draft_from(&self, job: &str, prompt: &str) -> Result<AlgorithmDraft, AutomationError> {
        let value = self
            .llm
            .generate_json(prompt, &schema::algorithm_schema())
            .await?;
        let draft: AlgorithmDraft = serde_json::from_value(value).map_err(|e| {
            AutomationError::ValidationFailed(format!("{} returned an unexpected shape: {}", job, e))
        })?;

        let missing = draft.missing_fields();
        if !missing.is_empty() {
            warn!("{} draft is missing fields: {}", job, missing.join(", "));
        }
        Ok(draft)
    }
}

/// Render list fields as a numbered block for prompts.
fn numbered(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
