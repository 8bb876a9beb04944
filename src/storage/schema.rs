//! Database schema definitions and startup initialization

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::Result;
use super::now_timestamp;

/// Username of the bootstrap admin seeded into an empty store
pub const ADMIN_USERNAME: &str = "admin";

/// Email given to the bootstrap admin
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// SQL to create the users table
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    email TEXT,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// SQL to create the user_progress table
/// One row per (user, chapter, topic); writes are upserts
pub const CREATE_USER_PROGRESS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    chapter_id TEXT NOT NULL,
    topic_id TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    completed_at TEXT,
    UNIQUE(user_id, chapter_id, topic_id)
)
"#;

/// SQL to create the user_notes table
pub const CREATE_USER_NOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    chapter_id TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// SQL to create the quiz_results table (append-only)
pub const CREATE_QUIZ_RESULTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quiz_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    total_questions INTEGER NOT NULL,
    correct_answers INTEGER NOT NULL,
    chapter_id TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// SQL to create the study_sessions table
pub const CREATE_STUDY_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS study_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    chapter_id TEXT NOT NULL,
    start_time TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    end_time TEXT,
    duration_minutes INTEGER
)
"#;

/// SQL to create indexes
/// Runs after migrations so indexed columns exist on upgraded stores
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_is_admin ON users(is_admin)",
    "CREATE INDEX IF NOT EXISTS idx_progress_user ON user_progress(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_progress_chapter ON user_progress(chapter_id, is_completed)",
    "CREATE INDEX IF NOT EXISTS idx_notes_user ON user_notes(user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_quiz_user ON quiz_results(user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON study_sessions(user_id)",
];

/// Connection-level pragmas applied to every handle
pub const CONNECTION_PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_USERS_TABLE,
        CREATE_USER_PROGRESS_TABLE,
        CREATE_USER_NOTES_TABLE,
        CREATE_QUIZ_RESULTS_TABLE,
        CREATE_STUDY_SESSIONS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// A column added after the first release of a table.
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    /// Column definition as accepted by `ALTER TABLE .. ADD COLUMN`
    pub definition: &'static str,
    /// Fills the new column for rows that predate it
    pub backfill: Option<fn(&Connection) -> rusqlite::Result<()>>,
}

/// Column migrations, applied in order, only to tables that already exist.
pub const MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "users",
        column: "is_admin",
        definition: "is_admin INTEGER NOT NULL DEFAULT 0",
        backfill: None,
    },
    ColumnMigration {
        table: "user_progress",
        column: "updated_at",
        definition: "updated_at TEXT",
        backfill: Some(|conn: &Connection| {
            let now = now_timestamp();
            if has_column(conn, "user_progress", "completion_date")? {
                conn.execute(
                    "UPDATE user_progress SET updated_at = COALESCE(completion_date, ?1)",
                    [&now],
                )?;
            } else {
                conn.execute("UPDATE user_progress SET updated_at = ?1", [&now])?;
            }
            Ok(())
        }),
    },
    ColumnMigration {
        table: "user_progress",
        column: "completed_at",
        definition: "completed_at TEXT",
        backfill: Some(|conn: &Connection| {
            if has_column(conn, "user_progress", "completion_date")? {
                conn.execute(
                    "UPDATE user_progress SET completed_at = completion_date WHERE is_completed = 1",
                    [],
                )?;
            }
            Ok(())
        }),
    },
    ColumnMigration {
        table: "quiz_results",
        column: "chapter_id",
        definition: "chapter_id TEXT",
        backfill: None,
    },
    ColumnMigration {
        table: "quiz_results",
        column: "created_at",
        definition: "created_at TEXT",
        backfill: Some(|conn: &Connection| {
            let now = now_timestamp();
            if has_column(conn, "quiz_results", "quiz_date")? {
                conn.execute("UPDATE quiz_results SET created_at = COALESCE(quiz_date, ?1)", [&now])?;
            } else {
                conn.execute("UPDATE quiz_results SET created_at = ?1", [&now])?;
            }
            Ok(())
        }),
    },
];

/// Check whether a table exists
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Check whether a table has a column
pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Apply pending column migrations; returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    let mut applied = 0;
    for migration in MIGRATIONS {
        if !table_exists(conn, migration.table)? || has_column(conn, migration.table, migration.column)? {
            continue;
        }

        debug!(table = migration.table, column = migration.column, "applying column migration");
        conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {}",
            migration.table, migration.definition
        ))?;
        if let Some(backfill) = migration.backfill {
            backfill(conn)?;
        }
        applied += 1;
    }
    Ok(applied)
}

/// Ensure a bootstrap admin exists. Returns true if a row was written.
///
/// An existing `admin` user without the flag (e.g. one created before the
/// `is_admin` column existed) is promoted instead of duplicated.
pub fn seed_admin(conn: &Connection) -> Result<bool> {
    let admins: i64 = conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| row.get(0))?;
    if admins > 0 {
        return Ok(false);
    }

    let promoted = conn.execute(
        "UPDATE users SET is_admin = 1 WHERE username = ?1",
        [ADMIN_USERNAME],
    )?;
    if promoted > 0 {
        info!(username = ADMIN_USERNAME, "granted admin privileges to existing admin user");
        return Ok(true);
    }

    conn.execute(
        "INSERT INTO users (username, email, is_admin, created_at) VALUES (?1, ?2, 1, ?3)",
        params![ADMIN_USERNAME, ADMIN_EMAIL, now_timestamp()],
    )?;
    info!(username = ADMIN_USERNAME, "created default admin user");
    Ok(true)
}

/// Bring a store up to the current schema and seed the admin.
///
/// Safe on every start. Callers run it inside one transaction so a failure
/// leaves no partial schema behind.
pub fn initialize(conn: &Connection) -> Result<()> {
    let migrated = run_migrations(conn)?;
    if migrated > 0 {
        info!(migrated, "upgraded existing schema");
    }

    for stmt in all_schema_statements() {
        conn.execute(stmt, [])?;
    }

    seed_admin(conn)?;
    Ok(())
}
