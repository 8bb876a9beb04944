use rusqlite::Row;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::instrument;

use crate::storage::base::{self, Direction, Order, Predicate, Record, nullable_text};
use crate::storage::{Database, now_timestamp};
use crate::{Error, Result};
use super::missing_user;

/// One quiz attempt. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResult {
    pub id: i64,
    pub user_id: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub chapter_id: Option<String>,
    pub created_at: String,
}

impl QuizResult {
    /// Score as a percentage; `None` for an empty quiz
    pub fn score_percent(&self) -> Option<f64> {
        (self.total_questions > 0).then(|| self.correct_answers as f64 * 100.0 / self.total_questions as f64)
    }
}

impl Record for QuizResult {
    const TABLE: &'static str = "quiz_results";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "total_questions",
        "correct_answers",
        "chapter_id",
        "created_at",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(QuizResult {
            id: row.get(0)?,
            user_id: row.get(1)?,
            total_questions: row.get(2)?,
            correct_answers: row.get(3)?,
            chapter_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub struct QuizDao {
    db: Database,
}

impl QuizDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a quiz result. Requires `0 <= correct_answers <= total_questions`.
    #[instrument(skip(self))]
    pub fn record_result(
        &self,
        user_id: i64,
        total_questions: i64,
        correct_answers: i64,
        chapter_id: Option<&str>,
    ) -> Result<bool> {
        if total_questions < 0 || correct_answers < 0 || correct_answers > total_questions {
            return Err(Error::InvalidInput(format!(
                "correct answers ({correct_answers}) must be between 0 and total questions ({total_questions})"
            )));
        }

        self.db.transaction(|tx| {
            base::insert_row(
                tx,
                QuizResult::TABLE,
                &[
                    ("user_id", Value::Integer(user_id)),
                    ("total_questions", Value::Integer(total_questions)),
                    ("correct_answers", Value::Integer(correct_answers)),
                    ("chapter_id", nullable_text(chapter_id)),
                    ("created_at", Value::Text(now_timestamp())),
                ],
            )
            .map_err(missing_user(user_id))
        })?;
        Ok(true)
    }

    /// A user's attempts, most recent first
    pub fn results_for(&self, user_id: i64) -> Result<Vec<QuizResult>> {
        self.db.query(|conn| {
            base::fetch_many(
                conn,
                &Predicate::eq("user_id", user_id),
                &Order::by("created_at", Direction::Desc).then("id", Direction::Desc),
            )
        })
    }
}
