use anyhow::Result;
use rusqlite::{Row, params};
use serde_json::Value;

use super::types::{AnalysisMode, AnalysisRecord};
use super::{Store, enum_column, json_column};

fn map_analysis(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    let mode: String = row.get(2)?;
    let result: String = row.get(3)?;
    Ok(AnalysisRecord {
        id: row.get(0)?,
        algorithm_id: row.get(1)?,
        mode: enum_column(2, &mode)?,
        result: json_column(3, &result)?,
        created_at: row.get(4)?,
    })
}

impl Store {
    pub async fn save_analysis(
        &self,
        algorithm_id: i64,
        mode: AnalysisMode,
        result: &Value,
    ) -> Result<i64> {
        let payload = serde_json::to_string(result)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO algorithm_analyses (algorithm_id, analysis_type, result) VALUES (?1, ?2, ?3)",
            params![algorithm_id, mode.as_str(), payload],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Newest first.
    pub async fn analyses_for(&self, algorithm_id: i64) -> Result<Vec<AnalysisRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, algorithm_id, analysis_type, result, created_at
             FROM algorithm_analyses
             WHERE algorithm_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![algorithm_id], map_analysis)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
