use anyhow::Result;
use rusqlite::{Row, params};

use super::types::{NewProblem, ProblemRecord};
use super::{Store, enum_column};

fn map_problem(row: &Row<'_>) -> rusqlite::Result<ProblemRecord> {
    let priority: String = row.get(4)?;
    Ok(ProblemRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        domain: row.get(3)?,
        priority: enum_column(4, &priority)?,
        solved: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    pub async fn add_problem(&self, problem: &NewProblem) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO problems (title, description, domain, priority) VALUES (?1, ?2, ?3, ?4)",
            params![
                problem.title,
                problem.description,
                problem.domain,
                problem.priority.as_str()
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Newest unsolved problems with high or critical priority.
    pub async fn recent_open_problems(&self, limit: usize) -> Result<Vec<ProblemRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, title, description, domain, priority, solved, created_at
             FROM problems
             WHERE solved = 0 AND priority IN ('high', 'critical')
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_problem)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn list_problems(&self, limit: usize) -> Result<Vec<ProblemRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, title, description, domain, priority, solved, created_at
             FROM problems ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_problem)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub async fn mark_problem_solved(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let updated = db.execute("UPDATE problems SET solved = 1 WHERE id = ?1", params![id])?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::ProblemPriority;

    fn problem(title: &str, priority: ProblemPriority) -> NewProblem {
        NewProblem {
            title: title.to_string(),
            description: format!("{title} needs solving"),
            domain: "Energy Systems".to_string(),
            priority,
        }
    }

    #[tokio::test]
    async fn recent_open_problems_filters_priority_and_solved() {
        let store = Store::open_in_memory();
        store.add_problem(&problem("low", ProblemPriority::Low)).await.unwrap();
        let high = store.add_problem(&problem("high", ProblemPriority::High)).await.unwrap();
        let crit = store
            .add_problem(&problem("critical", ProblemPriority::Critical))
            .await
            .unwrap();
        let solved = store
            .add_problem(&problem("solved", ProblemPriority::Critical))
            .await
            .unwrap();
        assert!(store.mark_problem_solved(solved).await.unwrap());
        assert!(!store.mark_problem_solved(9999).await.unwrap());

        let open = store.recent_open_problems(10).await.unwrap();
        let ids: Vec<_> = open.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![crit, high]);
        assert_eq!(open[0].priority, ProblemPriority::Critical);

        assert_eq!(store.recent_open_problems(1).await.unwrap().len(), 1);
        assert_eq!(store.list_problems(10).await.unwrap().len(), 4);
    }
}
