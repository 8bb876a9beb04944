//! Storage Layer - SQLite-backed persistence
//!
//! System of record is a single SQLite file with tables:
//! - users(username, email, is_admin)
//! - user_progress(user_id, chapter_id, topic_id, is_completed)
//! - user_notes(user_id, chapter_id, content)
//! - quiz_results(user_id, total_questions, correct_answers, chapter_id)
//! - study_sessions(user_id, chapter_id, start_time, end_time)

pub mod base;
pub mod database;
pub mod schema;

pub use base::{Direction, Order, Predicate, Record};
pub use database::{Database, DatabaseConfig};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC instant the way every timestamp column stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in storage format, e.g. `2026-10-17T09:30:00.123Z`.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp, including the `YYYY-MM-DD HH:MM:SS` form
/// written by SQLite's `CURRENT_TIMESTAMP` in older stores.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
