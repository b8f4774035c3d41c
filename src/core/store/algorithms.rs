use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::time::Duration;

use super::types::{AlgorithmRecord, NewAlgorithm};
use super::{Store, enum_column, json_column};

const ALGORITHM_COLUMNS: &str = "a.id, a.name, a.inspiration, a.domain, a.description, a.principle,
    a.steps, a.applications, a.pseudo_code, a.tags, a.type, a.parent_ids, a.likes, a.views,
    (SELECT AVG(r.score) FROM algorithm_ratings r WHERE r.algorithm_id = a.id) AS avg_score,
    a.created_at";

fn map_algorithm(row: &Row<'_>) -> rusqlite::Result<AlgorithmRecord> {
    let steps: String = row.get(6)?;
    let applications: String = row.get(7)?;
    let tags: String = row.get(9)?;
    let kind: String = row.get(10)?;
    let parent_ids: Option<String> = row.get(11)?;

    Ok(AlgorithmRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        inspiration: row.get(2)?,
        domain: row.get(3)?,
        description: row.get(4)?,
        principle: row.get(5)?,
        steps: json_column(6, &steps)?,
        applications: json_column(7, &applications)?,
        pseudo_code: row.get(8)?,
        tags: json_column(9, &tags)?,
        kind: enum_column(10, &kind)?,
        parent_ids: parent_ids
            .as_deref()
            .map(|raw| json_column(11, raw))
            .transpose()?,
        likes: row.get(12)?,
        views: row.get(13)?,
        avg_score: row.get(14)?,
        created_at: row.get(15)?,
    })
}

fn fetch_algorithm(db: &Connection, id: i64) -> Result<Option<AlgorithmRecord>> {
    let sql = format!("SELECT {} FROM algorithms a WHERE a.id = ?1", ALGORITHM_COLUMNS);
    Ok(db.query_row(&sql, params![id], map_algorithm).optional()?)
}

impl Store {
    pub async fn insert_algorithm(&self, algo: &NewAlgorithm) -> Result<i64> {
        let steps = serde_json::to_string(&algo.steps)?;
        let applications = serde_json::to_string(&algo.applications)?;
        let tags = serde_json::to_string(&algo.unique_tags())?;
        let parent_ids = algo
            .parent_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO algorithms (name, inspiration, domain, description, principle, steps,
                applications, pseudo_code, tags, type, parent_ids)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                algo.name,
                algo.inspiration,
                algo.domain,
                algo.description,
                algo.principle,
                steps,
                applications,
                algo.pseudo_code,
                tags,
                algo.kind.as_str(),
                parent_ids,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub async fn get_algorithm(&self, id: i64) -> Result<Option<AlgorithmRecord>> {
        let db = self.db.lock().await;
        fetch_algorithm(&db, id)
    }

    /// Records for `ids` in the order given; unknown ids are skipped.
    pub async fn get_algorithms(&self, ids: &[i64]) -> Result<Vec<AlgorithmRecord>> {
        let db = self.db.lock().await;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(algo) = fetch_algorithm(&db, *id)? {
                out.push(algo);
            }
        }
        Ok(out)
    }

    /// Highest `likes*2 + views + avgScore*10` first.
    pub async fn top_algorithms(&self, limit: usize) -> Result<Vec<AlgorithmRecord>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM algorithms a
             ORDER BY (a.likes * 2 + a.views
                + COALESCE((SELECT AVG(r.score) FROM algorithm_ratings r WHERE r.algorithm_id = a.id), 0) * 10) DESC,
                a.id DESC
             LIMIT ?1",
            ALGORITHM_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], map_algorithm)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Algorithms with no analysis of any kind newer than `stale_after`. Ones never
    /// failed in review come first, oldest first; recently failed ones go last.
    pub async fn algorithms_needing_analysis(
        &self,
        limit: usize,
        stale_after: Duration,
    ) -> Result<Vec<AlgorithmRecord>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM algorithms a
             WHERE NOT EXISTS (
                SELECT 1 FROM algorithm_analyses x
                WHERE x.algorithm_id = a.id AND x.created_at > datetime('now', ?1)
             )
             ORDER BY (
                SELECT MAX(l.created_at) FROM automation_logs l
                WHERE l.algorithm_id = a.id AND l.task_type = 'improve' AND l.status = 'failed'
             ) ASC,
                a.created_at ASC, a.id ASC
             LIMIT ?2",
            ALGORITHM_COLUMNS
        );
        let modifier = format!("-{} seconds", stale_after.as_secs());
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![modifier, limit as i64], map_algorithm)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}
