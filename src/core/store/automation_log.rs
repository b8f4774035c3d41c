use anyhow::Result;
use rusqlite::{Row, params};

use super::types::{AutomationLogEntry, NewLogEntry};
use super::{Store, enum_column, json_column};

fn map_log(row: &Row<'_>) -> rusqlite::Result<AutomationLogEntry> {
    let status: String = row.get(2)?;
    let details: String = row.get(3)?;
    Ok(AutomationLogEntry {
        id: row.get(0)?,
        task_type: row.get(1)?,
        status: enum_column(2, &status)?,
        details: json_column(3, &details)?,
        algorithm_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Store {
    /// Append-only: log rows are never updated or deleted.
    pub async fn append_log(&self, entry: &NewLogEntry) -> Result<i64> {
        let details = serde_json::to_string(&entry.details)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO automation_logs (task_type, status, details, algorithm_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.task_type,
                entry.status.as_str(),
                details,
                entry.algorithm_id
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Newest first, optionally restricted to one task type.
    pub async fn list_logs(
        &self,
        limit: usize,
        task_type: Option<&str>,
    ) -> Result<Vec<AutomationLogEntry>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, task_type, status, details, algorithm_id, created_at
             FROM automation_logs
             WHERE (?1 IS NULL OR task_type = ?1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![task_type, limit as i64], map_log)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::LogStatus;
    use serde_json::json;

    #[tokio::test]
    async fn logs_filter_by_task_and_serialize_external_shape() {
        let store = Store::open_in_memory();
        store
            .append_log(&NewLogEntry {
                task_type: "generate".into(),
                status: LogStatus::Success,
                details: json!({"name": "Ant Router"}),
                algorithm_id: Some(7),
            })
            .await
            .unwrap();
        store
            .append_log(&NewLogEntry {
                task_type: "improve".into(),
                status: LogStatus::Failed,
                details: json!({"error": "boom"}),
                algorithm_id: None,
            })
            .await
            .unwrap();

        let all = store.list_logs(10, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].task_type, "improve");

        let generate = store.list_logs(10, Some("generate")).await.unwrap();
        assert_eq!(generate.len(), 1);

        let wire = serde_json::to_value(&generate[0]).unwrap();
        assert_eq!(wire["taskType"], "generate");
        assert_eq!(wire["status"], "success");
        assert_eq!(wire["details"]["name"], "Ant Router");
        assert_eq!(wire["algorithmId"], 7);
        assert!(wire["createdAt"].is_string());
    }
}
