//! Flat functions in the shape the web layer already calls.
//!
//! Each function forwards to the matching [`PortalStore`] operation and
//! returns its result unchanged.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Result;
use crate::dao::{
    ChapterCompletion, MetadataUpdate, Note, ProgressMap, QuizResult, StudySession, SystemStatistics, UserDetails,
    UserSummary,
};
use crate::portal::{Portal, PortalStore};
use crate::storage::DatabaseConfig;

/// Open the store at `path` with default settings and initialize its schema.
pub fn initialize_database(path: impl Into<PathBuf>) -> Result<Portal> {
    Portal::open(DatabaseConfig::new(path))
}

pub fn get_or_create_user(
    store: &dyn PortalStore,
    username: &str,
    email: Option<&str>,
    is_admin: bool,
) -> Result<i64> {
    store.get_or_create_user(username, email, is_admin)
}

pub fn is_admin(store: &dyn PortalStore, username: &str) -> Result<bool> {
    store.is_admin(username)
}

pub fn set_admin_status(store: &dyn PortalStore, username: &str, is_admin: bool) -> Result<bool> {
    store.set_admin_status(username, is_admin)
}

pub fn update_user_metadata(store: &dyn PortalStore, user_id: i64, new_email: &str) -> Result<MetadataUpdate> {
    store.update_user_metadata(user_id, new_email)
}

pub fn get_user_details(store: &dyn PortalStore, user_id: i64) -> Result<Option<UserDetails>> {
    store.get_user_details(user_id)
}

pub fn get_all_users(store: &dyn PortalStore) -> Result<Vec<UserSummary>> {
    store.get_all_users()
}

pub fn delete_user(store: &dyn PortalStore, user_id: i64, acting_admin_id: i64) -> Result<()> {
    store.delete_user(user_id, acting_admin_id)
}

pub fn update_topic_progress(
    store: &dyn PortalStore,
    user_id: i64,
    chapter_id: &str,
    topic_id: &str,
    is_completed: bool,
) -> Result<bool> {
    store.update_topic_progress(user_id, chapter_id, topic_id, is_completed)
}

pub fn get_user_progress(store: &dyn PortalStore, user_id: i64) -> Result<ProgressMap> {
    store.get_user_progress(user_id)
}

pub fn get_chapter_completion_stats(
    store: &dyn PortalStore,
    user_id: i64,
) -> Result<BTreeMap<String, ChapterCompletion>> {
    store.get_chapter_completion_stats(user_id)
}

pub fn add_user_note(store: &dyn PortalStore, user_id: i64, chapter_id: &str, content: &str) -> Result<bool> {
    store.add_user_note(user_id, chapter_id, content)
}

pub fn get_user_notes(store: &dyn PortalStore, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<Note>> {
    store.get_user_notes(user_id, chapter_id)
}

pub fn record_quiz_result(
    store: &dyn PortalStore,
    user_id: i64,
    total_questions: i64,
    correct_answers: i64,
    chapter_id: Option<&str>,
) -> Result<bool> {
    store.record_quiz_result(user_id, total_questions, correct_answers, chapter_id)
}

pub fn get_quiz_results(store: &dyn PortalStore, user_id: i64) -> Result<Vec<QuizResult>> {
    store.get_quiz_results(user_id)
}

pub fn start_study_session(store: &dyn PortalStore, user_id: i64, chapter_id: &str) -> Result<i64> {
    store.start_study_session(user_id, chapter_id)
}

pub fn end_study_session(store: &dyn PortalStore, session_id: i64) -> Result<i64> {
    store.end_study_session(session_id)
}

pub fn get_study_sessions(store: &dyn PortalStore, user_id: i64) -> Result<Vec<StudySession>> {
    store.get_study_sessions(user_id)
}

pub fn get_system_statistics(store: &dyn PortalStore) -> Result<SystemStatistics> {
    store.get_system_statistics()
}
