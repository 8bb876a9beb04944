//! Connection/transaction provider

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::Result;
use super::schema;

/// Settings for opening the store. Passed explicitly; nothing is global.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// How long a handle waits on a lock held by another writer
    pub busy_timeout: Duration,
    /// Handles kept open between scopes
    pub max_idle_connections: usize,
}

impl DatabaseConfig {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_IDLE: usize = 4;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            max_idle_connections: Self::DEFAULT_MAX_IDLE,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_idle_connections(mut self, max_idle: usize) -> Self {
        self.max_idle_connections = max_idle;
        self
    }
}

struct Pool {
    config: DatabaseConfig,
    idle: Mutex<Vec<Connection>>,
    checked_out: AtomicUsize,
}

impl Pool {
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        conn.execute_batch(schema::CONNECTION_PRAGMAS)?;
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);

        // A handle still inside a transaction is never reused
        if !conn.is_autocommit() {
            warn!("discarding connection left inside a transaction");
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_idle_connections {
            idle.push(conn);
        }
    }
}

/// A handle borrowed from the pool, returned on drop.
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a Pool,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Shared handle to the SQLite store.
///
/// Cloning is cheap; all clones share one pool. Locking is left to SQLite:
/// WAL journaling lets readers run beside the single writer, and write scopes
/// open with `BEGIN IMMEDIATE` so writers queue on the busy timeout instead
/// of failing on lock upgrade.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool>,
}

impl Database {
    /// Open or create the database file described by `config`.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = Pool {
            config,
            idle: Mutex::new(Vec::new()),
            checked_out: AtomicUsize::new(0),
        };

        let conn = pool.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        pool.idle.lock().push(conn);

        info!(path = %pool.config.path.display(), "database opened");

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn path(&self) -> &Path {
        &self.pool.config.path
    }

    /// Handles currently borrowed by open scopes.
    pub fn checked_out(&self) -> usize {
        self.pool.checked_out.load(Ordering::SeqCst)
    }

    /// Handles parked in the pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle.lock().len()
    }

    fn acquire(&self) -> Result<PooledConnection<'_>> {
        let reused = self.pool.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.pool.connect()?,
        };
        self.pool.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            conn: Some(conn),
            pool: &self.pool,
        })
    }

    /// Run `f` against a handle outside any transaction.
    pub fn query<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.acquire()?;
        f(&conn)
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err` (or
    /// panics). The handle goes back to the pool either way.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.acquire()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                debug!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new(dir.path().join("portal.db"))).unwrap();
        db.transaction(|tx| {
            tx.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")?;
            Ok(())
        })
        .unwrap();
        (dir, db)
    }

    fn item_count(db: &Database) -> i64 {
        db.query(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("portal.db");
        let db = Database::open(DatabaseConfig::new(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }

    #[test]
    fn test_open_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = Database::open(DatabaseConfig::new(blocker.join("portal.db")));
        assert!(result.is_err());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let (_dir, db) = temp_db();
        let mode: String = db
            .query(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_transaction_commits() {
        let (_dir, db) = temp_db();
        db.transaction(|tx| {
            tx.execute("INSERT INTO items (name) VALUES ('a')", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(item_count(&db), 1);
        assert_eq!(db.checked_out(), 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (_dir, db) = temp_db();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute("INSERT INTO items (name) VALUES ('a')", [])?;
            tx.execute("INSERT INTO items (name) VALUES ('b')", [])?;
            Err(Error::InvalidInput("abort halfway".into()))
        });

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(item_count(&db), 0);
        assert_eq!(db.checked_out(), 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let (_dir, db) = temp_db();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = db.transaction(|tx| {
                tx.execute("INSERT INTO items (name) VALUES ('a')", [])?;
                panic!("body failed");
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(item_count(&db), 0);
        assert_eq!(db.checked_out(), 0);
    }

    #[test]
    fn test_query_releases_handle_on_error() {
        let (_dir, db) = temp_db();
        let result: Result<i64> = db.query(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM missing_table", [], |row| row.get(0))?)
        });

        assert!(result.unwrap_err().is_storage_fault());
        assert_eq!(db.checked_out(), 0);
        assert!(db.idle_connections() >= 1);
    }

    #[test]
    fn test_idle_pool_is_bounded() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path().join("portal.db")).with_max_idle_connections(1);
        let db = Database::open(config).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    db.query(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
                        .unwrap();
                });
            }
        });

        assert_eq!(db.checked_out(), 0);
        assert!(db.idle_connections() <= 1);
    }
}
