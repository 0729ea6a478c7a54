//! Local storage for the versioned question set.
//!
//! The full set is replaced in one transaction together with the version
//! row, so a reader sees either the complete old snapshot or the complete
//! new one.

use std::future::Future;

use sqlx::SqlitePool;

use super::{format_ts, parse_ts};
use crate::error::Result;
use crate::models::{ContentVersion, QuizQuestion};

/// Local persistence contract for bulk reference content.
pub trait QuestionStore: Send + Sync {
    /// Deletes every held question, inserts the new set, and persists the
    /// new version record, all inside a single transaction. On failure the
    /// previous snapshot remains intact.
    fn replace_all(
        &self,
        questions: &[QuizQuestion],
        version: &ContentVersion,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The version record of the snapshot currently held, if any.
    fn current_version(&self) -> impl Future<Output = Result<Option<ContentVersion>>> + Send;
}

/// `SQLite` implementation of [`QuestionStore`].
#[derive(Debug, Clone)]
pub struct SqliteQuestionStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    version: String,
    fetched_at: String,
    total_questions: i64,
}

impl SqliteQuestionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Questions for one category, in dataset order.
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<QuizQuestion>> {
        let rows: Vec<(String, String, String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT id, category, prompt, choices, correct_index, explanation
             FROM questions WHERE category = ? ORDER BY rowid",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, category, prompt, choices, correct_index, explanation)| {
                let choices: Vec<String> = serde_json::from_str(&choices)?;
                Ok(QuizQuestion {
                    id,
                    category,
                    prompt,
                    choices,
                    correct_index: correct_index as u32,
                    explanation,
                })
            })
            .collect()
    }
}

impl QuestionStore for SqliteQuestionStore {
    async fn replace_all(&self, questions: &[QuizQuestion], version: &ContentVersion) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM questions").execute(&mut *tx).await?;

        for question in questions {
            let choices = serde_json::to_string(&question.choices)?;
            sqlx::query(
                "INSERT INTO questions (id, category, prompt, choices, correct_index, explanation)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&question.id)
            .bind(&question.category)
            .bind(&question.prompt)
            .bind(choices)
            .bind(i64::from(question.correct_index))
            .bind(&question.explanation)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO content_version (id, version, fetched_at, total_questions)
             VALUES (1, ?, ?, ?)",
        )
        .bind(&version.version)
        .bind(format_ts(version.fetched_at))
        .bind(i64::from(version.total_questions))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(questions.len() as u64)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn current_version(&self) -> Result<Option<ContentVersion>> {
        let row: Option<VersionRow> =
            sqlx::query_as("SELECT version, fetched_at, total_questions FROM content_version WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| {
            Ok(ContentVersion {
                fetched_at: parse_ts(&row.fetched_at, "content_version")?,
                version: row.version,
                total_questions: row.total_questions as u32,
            })
        })
        .transpose()
    }
}
