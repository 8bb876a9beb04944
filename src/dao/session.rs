use chrono::Utc;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::storage::base::{self, Direction, Order, Predicate, Record};
use crate::storage::{Database, format_timestamp, parse_timestamp};
use crate::{Error, Result};
use super::missing_user;

/// A timed study session on one chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub chapter_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl StudySession {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

impl Record for StudySession {
    const TABLE: &'static str = "study_sessions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "chapter_id",
        "start_time",
        "end_time",
        "duration_minutes",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StudySession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            chapter_id: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            duration_minutes: row.get(5)?,
        })
    }
}

pub struct SessionDao {
    db: Database,
}

impl SessionDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a session starting now; returns its id.
    #[instrument(skip(self))]
    pub fn start(&self, user_id: i64, chapter_id: &str) -> Result<i64> {
        self.db.transaction(|tx| {
            base::insert_row(
                tx,
                StudySession::TABLE,
                &[
                    ("user_id", Value::Integer(user_id)),
                    ("chapter_id", Value::Text(chapter_id.to_owned())),
                    ("start_time", Value::Text(format_timestamp(Utc::now()))),
                ],
            )
            .map_err(missing_user(user_id))
        })
    }

    /// Close an open session; returns its length in whole minutes.
    #[instrument(skip(self))]
    pub fn finish(&self, session_id: i64) -> Result<i64> {
        self.db.transaction(|tx| {
            let session = base::fetch_one::<StudySession>(tx, &Predicate::eq("id", session_id))?
                .ok_or_else(|| Error::not_found("study session", session_id))?;
            if session.is_finished() {
                return Err(Error::InvalidInput(format!("study session {session_id} already finished")));
            }

            let ended = Utc::now();
            let minutes = match parse_timestamp(&session.start_time) {
                Some(started) => (ended - started).num_minutes().max(0),
                None => {
                    warn!(start_time = %session.start_time, "unreadable session start time");
                    0
                }
            };

            base::update_row(
                tx,
                StudySession::TABLE,
                &Predicate::eq("id", session_id).and_is_null("end_time"),
                &[
                    ("end_time", Value::Text(format_timestamp(ended))),
                    ("duration_minutes", Value::Integer(minutes)),
                ],
            )?;
            Ok(minutes)
        })
    }

    /// A user's sessions, most recent first
    pub fn sessions_for(&self, user_id: i64) -> Result<Vec<StudySession>> {
        self.db.query(|conn| {
            base::fetch_many(
                conn,
                &Predicate::eq("user_id", user_id),
                &Order::by("start_time", Direction::Desc).then("id", Direction::Desc),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::UserDao;
    use crate::dao::test_support::test_db;

    #[test]
    fn test_start_and_finish() {
        let (_dir, db) = test_db();
        let user = UserDao::new(db.clone()).get_or_create("alice", None, false).unwrap();
        let sessions = SessionDao::new(db.clone());

        let id = sessions.start(user, "chapter1").unwrap();
        let started = Utc::now() - chrono::Duration::minutes(90);
        db.transaction(|tx| {
            base::update_row(
                tx,
                StudySession::TABLE,
                &Predicate::eq("id", id),
                &[("start_time", Value::Text(format_timestamp(started)))],
            )
        })
        .unwrap();

        let minutes = sessions.finish(id).unwrap();
        assert!((90..=91).contains(&minutes), "got {minutes}");

        let listed = sessions.sessions_for(user).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_finished());
        assert_eq!(listed[0].duration_minutes, Some(minutes));
    }

    #[test]
    fn test_finish_twice_fails() {
        let (_dir, db) = test_db();
        let user = UserDao::new(db.clone()).get_or_create("alice", None, false).unwrap();
        let sessions = SessionDao::new(db);

        let id = sessions.start(user, "chapter1").unwrap();
        assert_eq!(sessions.finish(id).unwrap(), 0);
        assert!(matches!(sessions.finish(id), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_finish_unknown_session() {
        let (_dir, db) = test_db();
        let sessions = SessionDao::new(db);
        assert!(matches!(
            sessions.finish(31337),
            Err(Error::NotFound { entity: "study session", .. })
        ));
    }
}
