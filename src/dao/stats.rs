//! Read-only aggregates for the admin dashboard. Nothing here writes.

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::Result;
use crate::storage::base::{self, Predicate};
use crate::storage::{Database, format_timestamp};
use super::percentage;

/// Window for the "new users" figure
pub const NEW_USER_WINDOW_DAYS: i64 = 7;

/// Chapters listed in `most_active_chapters`
pub const MOST_ACTIVE_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterActivity {
    pub chapter_id: String,
    pub completion_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatistics {
    pub total_users: i64,
    pub admin_users: i64,
    pub new_users_7_days: i64,
    pub total_progress_entries: i64,
    pub total_topics_completed: i64,
    /// Completed share of all progress rows, in percent
    pub completion_rate: f64,
    pub total_notes: i64,
    pub total_quiz_attempts: i64,
    pub avg_quiz_score: f64,
    pub total_study_sessions: i64,
    pub total_study_minutes: i64,
    pub most_active_chapters: Vec<ChapterActivity>,
}

pub struct StatsDao {
    db: Database,
}

impl StatsDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn system_statistics(&self) -> Result<SystemStatistics> {
        self.db.query(|conn| {
            let cutoff = format_timestamp(Utc::now() - chrono::Duration::days(NEW_USER_WINDOW_DAYS));

            let total_progress_entries = scalar(conn, "SELECT COUNT(*) FROM user_progress")?;
            let total_topics_completed = scalar(conn, "SELECT COUNT(*) FROM user_progress WHERE is_completed = 1")?;

            let avg_quiz_score: Option<f64> = conn.query_row(
                "SELECT AVG(correct_answers * 100.0 / NULLIF(total_questions, 0)) FROM quiz_results",
                [],
                |row| row.get(0),
            )?;

            Ok(SystemStatistics {
                total_users: scalar(conn, "SELECT COUNT(*) FROM users")?,
                admin_users: scalar(conn, "SELECT COUNT(*) FROM users WHERE is_admin = 1")?,
                new_users_7_days: base::count(conn, "users", &Predicate::all().and_gt("created_at", cutoff))?,
                total_progress_entries,
                total_topics_completed,
                completion_rate: percentage(total_topics_completed, total_progress_entries),
                total_notes: scalar(conn, "SELECT COUNT(*) FROM user_notes")?,
                total_quiz_attempts: scalar(conn, "SELECT COUNT(*) FROM quiz_results")?,
                avg_quiz_score: avg_quiz_score.unwrap_or(0.0),
                total_study_sessions: scalar(conn, "SELECT COUNT(*) FROM study_sessions")?,
                total_study_minutes: scalar(conn, "SELECT COALESCE(SUM(duration_minutes), 0) FROM study_sessions")?,
                most_active_chapters: most_active_chapters(conn)?,
            })
        })
    }
}

fn scalar(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

fn most_active_chapters(conn: &Connection) -> Result<Vec<ChapterActivity>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT chapter_id, COUNT(*) AS completion_count
        FROM user_progress
        WHERE is_completed = 1
        GROUP BY chapter_id
        ORDER BY completion_count DESC, chapter_id ASC
        LIMIT ?1
        "#,
    )?;

    let chapters = stmt
        .query_map(params![MOST_ACTIVE_LIMIT], |row| {
            Ok(ChapterActivity {
                chapter_id: row.get(0)?,
                completion_count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::test_support::test_db;
    use crate::dao::{ProgressDao, QuizDao, UserDao};

    #[test]
    fn test_fresh_store_has_only_admin() {
        let (_dir, db) = test_db();
        let stats = StatsDao::new(db).system_statistics().unwrap();

        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.admin_users, 1);
        assert_eq!(stats.new_users_7_days, 1);
        assert_eq!(stats.total_quiz_attempts, 0);
        assert_eq!(stats.avg_quiz_score, 0.0);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(stats.most_active_chapters.is_empty());
    }

    #[test]
    fn test_aggregates() {
        let (_dir, db) = test_db();
        let users = UserDao::new(db.clone());
        let progress = ProgressDao::new(db.clone());
        let quiz = QuizDao::new(db.clone());

        let alice = users.get_or_create("alice", None, false).unwrap();
        let bob = users.get_or_create("bob", None, false).unwrap();

        progress.update_topic_progress(alice, "chapter1", "topic1", true).unwrap();
        progress.update_topic_progress(alice, "chapter1", "topic2", false).unwrap();
        progress.update_topic_progress(bob, "chapter1", "topic1", true).unwrap();
        progress.update_topic_progress(bob, "chapter2", "topic1", true).unwrap();

        quiz.record_result(alice, 10, 7, Some("chapter1")).unwrap();
        quiz.record_result(bob, 4, 4, None).unwrap();

        let stats = StatsDao::new(db).system_statistics().unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_progress_entries, 4);
        assert_eq!(stats.total_topics_completed, 3);
        assert_eq!(stats.completion_rate, 75.0);
        assert_eq!(stats.total_quiz_attempts, 2);
        assert!((stats.avg_quiz_score - 85.0).abs() < 1e-9);
        assert_eq!(
            stats.most_active_chapters,
            vec![
                ChapterActivity { chapter_id: "chapter1".into(), completion_count: 2 },
                ChapterActivity { chapter_id: "chapter2".into(), completion_count: 1 },
            ]
        );
    }

    #[test]
    fn test_statistics_do_not_write() {
        let (_dir, db) = test_db();
        let before = UserDao::new(db.clone()).list_all().unwrap().len();
        StatsDao::new(db.clone()).system_statistics().unwrap();
        StatsDao::new(db.clone()).system_statistics().unwrap();
        assert_eq!(UserDao::new(db).list_all().unwrap().len(), before);
    }
}
