use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{Row, params};
use serde::Serialize;
use tracing::instrument;

use crate::Result;
use crate::storage::base::{self, Direction, Order, Predicate, Record};
use crate::storage::{Database, now_timestamp};
use super::{missing_user, percentage};

/// A stored progress row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEntry {
    pub id: i64,
    pub user_id: i64,
    pub chapter_id: String,
    pub topic_id: String,
    pub is_completed: bool,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl Record for ProgressEntry {
    const TABLE: &'static str = "user_progress";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "chapter_id",
        "topic_id",
        "is_completed",
        "updated_at",
        "completed_at",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ProgressEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            chapter_id: row.get(2)?,
            topic_id: row.get(3)?,
            is_completed: row.get(4)?,
            updated_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicProgress {
    pub is_completed: bool,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// chapter id -> topic id -> progress
pub type ProgressMap = BTreeMap<String, BTreeMap<String, TopicProgress>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterCompletion {
    pub total_topics: i64,
    pub completed_topics: i64,
    pub completion_percentage: f64,
}

pub struct ProgressDao {
    db: Database,
}

impl ProgressDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Mark a topic complete or incomplete, creating its row on first use.
    #[instrument(skip(self))]
    pub fn update_topic_progress(
        &self,
        user_id: i64,
        chapter_id: &str,
        topic_id: &str,
        is_completed: bool,
    ) -> Result<bool> {
        let now = now_timestamp();
        let completed_at = if is_completed {
            Value::Text(now.clone())
        } else {
            Value::Null
        };

        self.db.transaction(|tx| {
            let key = Predicate::eq("user_id", user_id)
                .and_eq("chapter_id", chapter_id.to_owned())
                .and_eq("topic_id", topic_id.to_owned());

            let changed = base::update_row(
                tx,
                ProgressEntry::TABLE,
                &key,
                &[
                    ("is_completed", Value::from(is_completed)),
                    ("updated_at", Value::Text(now.clone())),
                    ("completed_at", completed_at.clone()),
                ],
            )?;

            if changed == 0 {
                base::insert_row(
                    tx,
                    ProgressEntry::TABLE,
                    &[
                        ("user_id", Value::Integer(user_id)),
                        ("chapter_id", Value::Text(chapter_id.to_owned())),
                        ("topic_id", Value::Text(topic_id.to_owned())),
                        ("is_completed", Value::from(is_completed)),
                        ("updated_at", Value::Text(now.clone())),
                        ("completed_at", completed_at.clone()),
                    ],
                )
                .map_err(missing_user(user_id))?;
            }
            Ok(true)
        })
    }

    /// All progress rows for a user, nested by chapter then topic.
    pub fn get_user_progress(&self, user_id: i64) -> Result<ProgressMap> {
        let entries: Vec<ProgressEntry> = self.db.query(|conn| {
            base::fetch_many(
                conn,
                &Predicate::eq("user_id", user_id),
                &Order::by("chapter_id", Direction::Asc).then("topic_id", Direction::Asc),
            )
        })?;

        let mut progress = ProgressMap::new();
        for entry in entries {
            progress.entry(entry.chapter_id).or_default().insert(
                entry.topic_id,
                TopicProgress {
                    is_completed: entry.is_completed,
                    updated_at: entry.updated_at,
                    completed_at: entry.completed_at,
                },
            );
        }
        Ok(progress)
    }

    /// Per-chapter totals over the topics a user has touched
    pub fn chapter_completion(&self, user_id: i64) -> Result<BTreeMap<String, ChapterCompletion>> {
        self.db.query(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT chapter_id, COUNT(*), COALESCE(SUM(is_completed), 0)
                FROM user_progress
                WHERE user_id = ?1
                GROUP BY chapter_id
                "#,
            )?;

            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .map(|(chapter_id, total_topics, completed_topics)| {
                    let completion = ChapterCompletion {
                        total_topics,
                        completed_topics,
                        completion_percentage: percentage(completed_topics, total_topics),
                    };
                    (chapter_id, completion)
                })
                .collect())
        })
    }
}
