//! The accessor interface handed to the web layer.
//!
//! [`PortalStore`] lists every operation the portal needs from storage;
//! [`Portal`] implements it over one [`Database`] and the entity accessors.

use std::collections::BTreeMap;

use tracing::info;

use crate::Result;
use crate::dao::{
    ChapterCompletion, MetadataUpdate, Note, NotesDao, ProgressDao, ProgressMap, QuizDao, QuizResult,
    SessionDao, StatsDao, StudySession, SystemStatistics, UserDao, UserDetails, UserSummary,
};
use crate::storage::{Database, DatabaseConfig, schema};

pub trait PortalStore: Send + Sync {
    // Users
    fn get_or_create_user(&self, username: &str, email: Option<&str>, is_admin: bool) -> Result<i64>;
    fn is_admin(&self, username: &str) -> Result<bool>;
    fn set_admin_status(&self, username: &str, is_admin: bool) -> Result<bool>;
    fn update_user_metadata(&self, user_id: i64, new_email: &str) -> Result<MetadataUpdate>;
    fn get_user_details(&self, user_id: i64) -> Result<Option<UserDetails>>;
    fn get_all_users(&self) -> Result<Vec<UserSummary>>;
    fn delete_user(&self, user_id: i64, acting_admin_id: i64) -> Result<()>;

    // Progress
    fn update_topic_progress(&self, user_id: i64, chapter_id: &str, topic_id: &str, is_completed: bool)
    -> Result<bool>;
    fn get_user_progress(&self, user_id: i64) -> Result<ProgressMap>;
    fn get_chapter_completion_stats(&self, user_id: i64) -> Result<BTreeMap<String, ChapterCompletion>>;

    // Notes
    fn add_user_note(&self, user_id: i64, chapter_id: &str, content: &str) -> Result<bool>;
    fn get_user_notes(&self, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<Note>>;

    // Quizzes
    fn record_quiz_result(
        &self,
        user_id: i64,
        total_questions: i64,
        correct_answers: i64,
        chapter_id: Option<&str>,
    ) -> Result<bool>;
    fn get_quiz_results(&self, user_id: i64) -> Result<Vec<QuizResult>>;

    // Study sessions
    fn start_study_session(&self, user_id: i64, chapter_id: &str) -> Result<i64>;
    fn end_study_session(&self, session_id: i64) -> Result<i64>;
    fn get_study_sessions(&self, user_id: i64) -> Result<Vec<StudySession>>;

    // Reporting
    fn get_system_statistics(&self) -> Result<SystemStatistics>;
}

/// SQLite-backed portal store
pub struct Portal {
    db: Database,
    users: UserDao,
    progress: ProgressDao,
    notes: NotesDao,
    quiz: QuizDao,
    sessions: SessionDao,
    stats: StatsDao,
}

impl Portal {
    /// Open the store and bring its schema up to date.
    ///
    /// Fails when the location cannot be created or written; no handle to a
    /// half-initialized store is returned.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let db = Database::open(config)?;
        db.transaction(|tx| schema::initialize(tx))?;
        info!(path = %db.path().display(), "portal store ready");
        Ok(Self::with_database(db))
    }

    /// Wrap an already-initialized database.
    pub fn with_database(db: Database) -> Self {
        Self {
            users: UserDao::new(db.clone()),
            progress: ProgressDao::new(db.clone()),
            notes: NotesDao::new(db.clone()),
            quiz: QuizDao::new(db.clone()),
            sessions: SessionDao::new(db.clone()),
            stats: StatsDao::new(db.clone()),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn users(&self) -> &UserDao {
        &self.users
    }

    pub fn progress(&self) -> &ProgressDao {
        &self.progress
    }

    pub fn notes(&self) -> &NotesDao {
        &self.notes
    }

    pub fn quiz(&self) -> &QuizDao {
        &self.quiz
    }

    pub fn sessions(&self) -> &SessionDao {
        &self.sessions
    }

    pub fn stats(&self) -> &StatsDao {
        &self.stats
    }
}

impl PortalStore for Portal {
    fn get_or_create_user(&self, username: &str, email: Option<&str>, is_admin: bool) -> Result<i64> {
        self.users.get_or_create(username, email, is_admin)
    }

    fn is_admin(&self, username: &str) -> Result<bool> {
        self.users.is_admin(username)
    }

    fn set_admin_status(&self, username: &str, is_admin: bool) -> Result<bool> {
        self.users.set_admin_status(username, is_admin)
    }

    fn update_user_metadata(&self, user_id: i64, new_email: &str) -> Result<MetadataUpdate> {
        self.users.update_metadata(user_id, new_email)
    }

    fn get_user_details(&self, user_id: i64) -> Result<Option<UserDetails>> {
        self.users.details(user_id)
    }

    fn get_all_users(&self) -> Result<Vec<UserSummary>> {
        self.users.list_all()
    }

    fn delete_user(&self, user_id: i64, acting_admin_id: i64) -> Result<()> {
        self.users.delete(user_id, acting_admin_id)
    }

    fn update_topic_progress(
        &self,
        user_id: i64,
        chapter_id: &str,
        topic_id: &str,
        is_completed: bool,
    ) -> Result<bool> {
        self.progress.update_topic_progress(user_id, chapter_id, topic_id, is_completed)
    }

    fn get_user_progress(&self, user_id: i64) -> Result<ProgressMap> {
        self.progress.get_user_progress(user_id)
    }

    fn get_chapter_completion_stats(&self, user_id: i64) -> Result<BTreeMap<String, ChapterCompletion>> {
        self.progress.chapter_completion(user_id)
    }

    fn add_user_note(&self, user_id: i64, chapter_id: &str, content: &str) -> Result<bool> {
        self.notes.add_note(user_id, chapter_id, content)
    }

    fn get_user_notes(&self, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<Note>> {
        self.notes.get_notes(user_id, chapter_id)
    }

    fn record_quiz_result(
        &self,
        user_id: i64,
        total_questions: i64,
        correct_answers: i64,
        chapter_id: Option<&str>,
    ) -> Result<bool> {
        self.quiz.record_result(user_id, total_questions, correct_answers, chapter_id)
    }

    fn get_quiz_results(&self, user_id: i64) -> Result<Vec<QuizResult>> {
        self.quiz.results_for(user_id)
    }

    fn start_study_session(&self, user_id: i64, chapter_id: &str) -> Result<i64> {
        self.sessions.start(user_id, chapter_id)
    }

    fn end_study_session(&self, session_id: i64) -> Result<i64> {
        self.sessions.finish(session_id)
    }

    fn get_study_sessions(&self, user_id: i64) -> Result<Vec<StudySession>> {
        self.sessions.sessions_for(user_id)
    }

    fn get_system_statistics(&self) -> Result<SystemStatistics> {
        self.stats.system_statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    fn open_portal(dir: &TempDir) -> Portal {
        Portal::open(DatabaseConfig::new(dir.path().join("data").join("portal.db"))).unwrap()
    }

    #[test]
    fn test_open_seeds_admin_once() {
        let dir = TempDir::new().unwrap();
        {
            let portal = open_portal(&dir);
            assert!(portal.is_admin("admin").unwrap());
        }

        let portal = open_portal(&dir);
        let admins: Vec<_> = portal
            .get_all_users()
            .unwrap()
            .into_iter()
            .filter(|user| user.is_admin)
            .collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email.as_deref(), Some(schema::ADMIN_EMAIL));
    }

    #[test]
    fn test_open_fails_on_unwritable_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let result = Portal::open(DatabaseConfig::new(blocker.join("portal.db")));
        assert!(matches!(result, Err(err) if err.is_storage_fault()));
    }

    #[test]
    fn test_delete_user_cascades() {
        let dir = TempDir::new().unwrap();
        let portal = open_portal(&dir);
        let admin = portal.users().get_by_username("admin").unwrap().unwrap();
        let bob = portal.get_or_create_user("bob", None, false).unwrap();

        portal.update_topic_progress(bob, "chapter1", "topic1", true).unwrap();
        portal.add_user_note(bob, "chapter1", "note").unwrap();
        portal.record_quiz_result(bob, 5, 3, None).unwrap();
        let session = portal.start_study_session(bob, "chapter1").unwrap();
        portal.end_study_session(session).unwrap();

        portal.delete_user(bob, admin.id).unwrap();

        assert!(portal.get_user_details(bob).unwrap().is_none());
        assert!(portal.get_user_progress(bob).unwrap().is_empty());
        assert!(portal.get_user_notes(bob, None).unwrap().is_empty());
        assert!(portal.get_quiz_results(bob).unwrap().is_empty());
        assert!(portal.get_study_sessions(bob).unwrap().is_empty());

        let stats = portal.get_system_statistics().unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_study_sessions, 0);

        assert!(matches!(portal.delete_user(bob, admin.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_user_details_reflect_activity() {
        let dir = TempDir::new().unwrap();
        let portal = open_portal(&dir);
        let carol = portal.get_or_create_user("carol", Some("carol@x.org"), false).unwrap();

        portal.update_topic_progress(carol, "chapter1", "topic1", true).unwrap();
        portal.update_topic_progress(carol, "chapter1", "topic2", false).unwrap();
        portal.record_quiz_result(carol, 10, 9, Some("chapter1")).unwrap();
        portal.start_study_session(carol, "chapter1").unwrap();

        let details = portal.get_user_details(carol).unwrap().unwrap();
        assert_eq!(details.progress.total_topics, 2);
        assert_eq!(details.progress.completed_topics, 1);
        assert_eq!(details.progress.completion_percentage, 50.0);
        assert_eq!(details.quiz.attempts, 1);
        assert!((details.quiz.avg_score - 90.0).abs() < 1e-9);
        assert_eq!(details.study.sessions, 1);

        let summary = portal
            .get_all_users()
            .unwrap()
            .into_iter()
            .find(|user| user.id == carol)
            .unwrap();
        assert_eq!(summary.progress_items, 2);
        assert_eq!(summary.quiz_attempts, 1);
        assert_eq!(summary.study_sessions, 1);
        assert_eq!(summary.notes_count, 0);
    }
}
