//! Entity accessors
//!
//! One accessor per entity, each holding a cloned [`Database`] handle and
//! running every operation in its own query or transaction scope.

pub mod notes;
pub mod progress;
pub mod quiz;
pub mod session;
pub mod stats;
pub mod user;

pub use notes::{Note, NotesDao};
pub use progress::{ChapterCompletion, ProgressDao, ProgressEntry, ProgressMap, TopicProgress};
pub use quiz::{QuizDao, QuizResult};
pub use session::{SessionDao, StudySession};
pub use stats::{ChapterActivity, StatsDao, SystemStatistics};
pub use user::{MetadataUpdate, User, UserDao, UserDetails, UserSummary};

use crate::Error;

/// Child rows reference `users(id)`; a foreign key failure there means the
/// user does not exist.
pub(crate) fn missing_user(user_id: i64) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::Constraint { .. } => Error::not_found("user", user_id),
        other => other,
    }
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0
pub(crate) fn percentage(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 * 100.0 / whole as f64
    } else {
        0.0
    }
}
