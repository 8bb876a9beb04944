use rusqlite::types::Value;
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use tracing::{info, instrument};

use crate::storage::base::{self, Predicate, Record, nullable_text};
use crate::storage::{Database, now_timestamp};
use crate::{Error, Result};
use super::percentage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["id", "username", "email", "is_admin", "created_at"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            is_admin: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

/// Outcome of an email change, kept for auditing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataUpdate {
    pub updated: bool,
    pub previous_email: Option<String>,
}

/// One line of the admin user listing
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
    pub progress_items: i64,
    pub notes_count: i64,
    pub study_sessions: i64,
    pub quiz_attempts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressTotals {
    pub total_topics: i64,
    pub completed_topics: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizTotals {
    pub attempts: i64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyTotals {
    pub sessions: i64,
    pub total_minutes: i64,
}

/// Profile plus activity totals for one user
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    pub user: User,
    pub progress: ProgressTotals,
    pub quiz: QuizTotals,
    pub study: StudyTotals,
}

/// Tables holding rows owned by a user, cleared before the user row itself
const USER_CHILD_TABLES: &[&str] = &["user_progress", "user_notes", "study_sessions", "quiz_results"];

fn by_username(username: &str) -> Predicate {
    Predicate::eq("username", username.to_owned())
}

pub struct UserDao {
    db: Database,
}

impl UserDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve a username to its id, creating the user on first sight.
    ///
    /// Repeat calls return the existing id and leave email and admin flag
    /// as first written.
    #[instrument(skip(self, email))]
    pub fn get_or_create(&self, username: &str, email: Option<&str>, is_admin: bool) -> Result<i64> {
        if username.trim().is_empty() {
            return Err(Error::InvalidInput("username must not be empty".into()));
        }

        self.db.transaction(|tx| {
            if let Some(user) = base::fetch_one::<User>(tx, &by_username(username))? {
                return Ok(user.id);
            }

            let inserted = base::insert_row(
                tx,
                User::TABLE,
                &[
                    ("username", Value::Text(username.to_owned())),
                    ("email", nullable_text(email)),
                    ("is_admin", Value::from(is_admin)),
                    ("created_at", Value::Text(now_timestamp())),
                ],
            );

            match inserted {
                Ok(id) => {
                    info!(user_id = id, "created user");
                    Ok(id)
                }
                // Lost a race with another writer; theirs is the first write.
                // No row under this username means another unique column clashed.
                Err(err @ Error::DuplicateKey { .. }) => {
                    match base::fetch_one::<User>(tx, &by_username(username))? {
                        Some(user) => Ok(user.id),
                        None => Err(err),
                    }
                }
                Err(err) => Err(err),
            }
        })
    }

    pub fn get(&self, user_id: i64) -> Result<Option<User>> {
        self.db.query(|conn| base::fetch_one(conn, &Predicate::eq("id", user_id)))
    }

    pub fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.db.query(|conn| base::fetch_one(conn, &by_username(username)))
    }

    /// False for unknown users.
    #[instrument(skip(self))]
    pub fn is_admin(&self, username: &str) -> Result<bool> {
        Ok(self.get_by_username(username)?.is_some_and(|user| user.is_admin))
    }

    /// Grant or revoke admin rights; returns whether a user row was touched.
    #[instrument(skip(self))]
    pub fn set_admin_status(&self, username: &str, is_admin: bool) -> Result<bool> {
        let changed = self.db.transaction(|tx| {
            base::update_row(tx, User::TABLE, &by_username(username), &[("is_admin", Value::from(is_admin))])
        })?;
        if changed > 0 {
            info!(is_admin, "admin status changed");
        }
        Ok(changed > 0)
    }

    #[instrument(skip(self, new_email))]
    pub fn update_metadata(&self, user_id: i64, new_email: &str) -> Result<MetadataUpdate> {
        self.db.transaction(|tx| {
            let user = base::fetch_one::<User>(tx, &Predicate::eq("id", user_id))?
                .ok_or_else(|| Error::not_found("user", user_id))?;

            let changed = base::update_row(
                tx,
                User::TABLE,
                &Predicate::eq("id", user_id),
                &[("email", Value::Text(new_email.to_owned()))],
            )?;

            Ok(MetadataUpdate {
                updated: changed > 0,
                previous_email: user.email,
            })
        })
    }

    /// Every user with activity counts, newest first
    pub fn list_all(&self) -> Result<Vec<UserSummary>> {
        self.db.query(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT
                    id, username, email, is_admin, created_at,
                    (SELECT COUNT(*) FROM user_progress WHERE user_id = users.id),
                    (SELECT COUNT(*) FROM user_notes WHERE user_id = users.id),
                    (SELECT COUNT(*) FROM study_sessions WHERE user_id = users.id),
                    (SELECT COUNT(*) FROM quiz_results WHERE user_id = users.id)
                FROM users
                ORDER BY created_at DESC, id DESC
                "#,
            )?;

            let users = stmt
                .query_map([], |row| {
                    Ok(UserSummary {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        is_admin: row.get(3)?,
                        created_at: row.get(4)?,
                        progress_items: row.get(5)?,
                        notes_count: row.get(6)?,
                        study_sessions: row.get(7)?,
                        quiz_attempts: row.get(8)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Profile and activity totals; `None` for unknown ids.
    pub fn details(&self, user_id: i64) -> Result<Option<UserDetails>> {
        self.db.query(|conn| {
            let Some(user) = base::fetch_one::<User>(conn, &Predicate::eq("id", user_id))? else {
                return Ok(None);
            };

            Ok(Some(UserDetails {
                user,
                progress: progress_totals(conn, user_id)?,
                quiz: quiz_totals(conn, user_id)?,
                study: study_totals(conn, user_id)?,
            }))
        })
    }

    /// Remove a user and everything they own, in one transaction.
    ///
    /// Admins cannot delete themselves. Nothing is removed when the user
    /// does not exist.
    #[instrument(skip(self))]
    pub fn delete(&self, user_id: i64, acting_admin_id: i64) -> Result<()> {
        if user_id == acting_admin_id {
            return Err(Error::InvalidInput("cannot delete your own account".into()));
        }

        self.db.transaction(|tx| {
            for &table in USER_CHILD_TABLES {
                base::delete_row(tx, table, &Predicate::eq("user_id", user_id))?;
            }
            if base::delete_row(tx, User::TABLE, &Predicate::eq("id", user_id))? == 0 {
                return Err(Error::not_found("user", user_id));
            }
            Ok(())
        })?;

        info!("deleted user and owned rows");
        Ok(())
    }
}

fn progress_totals(conn: &Connection, user_id: i64) -> Result<ProgressTotals> {
    let (total_topics, completed_topics): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM user_progress WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(ProgressTotals {
        total_topics,
        completed_topics,
        completion_percentage: percentage(completed_topics, total_topics),
    })
}

fn quiz_totals(conn: &Connection, user_id: i64) -> Result<QuizTotals> {
    let (attempts, avg_score): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(correct_answers * 100.0 / NULLIF(total_questions, 0))
         FROM quiz_results WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(QuizTotals {
        attempts,
        avg_score: avg_score.unwrap_or(0.0),
    })
}

fn study_totals(conn: &Connection, user_id: i64) -> Result<StudyTotals> {
    let (sessions, total_minutes): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(duration_minutes), 0) FROM study_sessions WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(StudyTotals { sessions, total_minutes })
}
