use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    Generated,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Sanity,
    BlindSpot,
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failed,
    AnalysisComplete,
}

/// Lowercase wire names shared by the database columns, JSON and CLI arguments.
macro_rules! text_enum {
    ($ty:ty, $what:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!("unknown {} '{}'", $what, other)),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

text_enum!(AlgorithmKind, "algorithm type", {
    AlgorithmKind::Generated => "generated",
    AlgorithmKind::Hybrid => "hybrid",
});

text_enum!(ProblemPriority, "priority", {
    ProblemPriority::Low => "low",
    ProblemPriority::Medium => "medium",
    ProblemPriority::High => "high",
    ProblemPriority::Critical => "critical",
});

text_enum!(AnalysisMode, "analysis mode", {
    AnalysisMode::Sanity => "sanity",
    AnalysisMode::BlindSpot => "blind_spot",
    AnalysisMode::Extension => "extension",
});

text_enum!(LogStatus, "log status", {
    LogStatus::Success => "success",
    LogStatus::Failed => "failed",
    LogStatus::AnalysisComplete => "analysis_complete",
});

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmRecord {
    pub id: i64,
    pub name: String,
    pub inspiration: String,
    pub domain: String,
    pub description: String,
    pub principle: String,
    pub steps: Vec<String>,
    pub applications: Vec<String>,
    pub pseudo_code: String,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: AlgorithmKind,
    pub parent_ids: Option<Vec<i64>>,
    pub likes: i64,
    pub views: i64,
    pub avg_score: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlgorithm {
    pub name: String,
    pub inspiration: String,
    pub domain: String,
    pub description: String,
    pub principle: String,
    pub steps: Vec<String>,
    pub applications: Vec<String>,
    pub pseudo_code: String,
    pub tags: Vec<String>,
    pub kind: AlgorithmKind,
    pub parent_ids: Option<Vec<i64>>,
}

impl NewAlgorithm {
    /// Tags are a set: trimmed, de-duplicated case-insensitively, first spelling kept.
    pub fn unique_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub domain: String,
    pub priority: ProblemPriority,
    pub solved: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewProblem {
    pub title: String,
    pub description: String,
    pub domain: String,
    pub priority: ProblemPriority,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: i64,
    pub algorithm_id: i64,
    pub mode: AnalysisMode,
    pub result: Value,
    pub created_at: String,
}

/// Row of the append-only automation log, serialized in its external shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationLogEntry {
    pub id: i64,
    pub task_type: String,
    pub status: LogStatus,
    pub details: Value,
    pub algorithm_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub task_type: String,
    pub status: LogStatus,
    pub details: Value,
    pub algorithm_id: Option<i64>,
}
