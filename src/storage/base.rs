//! Generic CRUD primitives shared by every entity accessor
//!
//! Table and column names are always `&'static str` chosen by accessor code;
//! caller-supplied values only ever travel as bound parameters.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

use crate::{Error, Result};

/// A typed row of one table.
pub trait Record: Sized {
    const TABLE: &'static str;
    /// Columns selected for this record, in `from_row` order
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone)]
enum Clause {
    Eq(&'static str, Value),
    Gt(&'static str, Value),
    IsNull(&'static str),
}

/// Conjunction of simple column conditions. Empty matches every row.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Matches every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    pub fn and_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(column, value.into()));
        self
    }

    pub fn and_gt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Gt(column, value.into()));
        self
    }

    pub fn and_is_null(mut self, column: &'static str) -> Self {
        self.clauses.push(Clause::IsNull(column));
        self
    }

    /// Render as a `WHERE ...` suffix (empty when matching all) plus params
    fn to_sql(&self) -> (String, Vec<Value>) {
        if self.clauses.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut values = Vec::new();
        for clause in &self.clauses {
            match clause {
                Clause::Eq(column, value) => {
                    parts.push(format!("{column} = ?"));
                    values.push(value.clone());
                }
                Clause::Gt(column, value) => {
                    parts.push(format!("{column} > ?"));
                    values.push(value.clone());
                }
                Clause::IsNull(column) => parts.push(format!("{column} IS NULL")),
            }
        }
        (format!(" WHERE {}", parts.join(" AND ")), values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Result ordering for `fetch_many`.
#[derive(Debug, Clone, Default)]
pub struct Order {
    keys: Vec<(&'static str, Direction)>,
}

impl Order {
    pub fn by(column: &'static str, direction: Direction) -> Self {
        Self::default().then(column, direction)
    }

    pub fn then(mut self, column: &'static str, direction: Direction) -> Self {
        self.keys.push((column, direction));
        self
    }

    /// `ORDER BY` clause, always ending on `id` so equal keys keep a fixed order
    fn to_sql(&self) -> String {
        let mut keys: Vec<String> = self
            .keys
            .iter()
            .map(|(column, direction)| format!("{column} {}", direction.as_str()))
            .collect();
        if !self.keys.iter().any(|(column, _)| *column == "id") {
            keys.push("id ASC".to_string());
        }
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// Convert an optional string into a nullable SQL value
pub fn nullable_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_owned()))
}

/// Insert one row; returns the generated id.
pub fn insert_row(conn: &Connection, table: &'static str, columns: &[(&'static str, Value)]) -> Result<i64> {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!("INSERT INTO {table} ({}) VALUES ({placeholders})", names.join(", "));

    conn.execute(&sql, params_from_iter(columns.iter().map(|(_, value)| value)))
        .map_err(|e| Error::from_sqlite(table, e))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch the first matching row. `Ok(None)` means no match.
pub fn fetch_one<R: Record>(conn: &Connection, predicate: &Predicate) -> Result<Option<R>> {
    let (filter, values) = predicate.to_sql();
    let sql = format!(
        "SELECT {} FROM {}{filter} ORDER BY id LIMIT 1",
        R::COLUMNS.join(", "),
        R::TABLE
    );

    conn.query_row(&sql, params_from_iter(values.iter()), |row| R::from_row(row))
        .optional()
        .map_err(|e| Error::from_sqlite(R::TABLE, e))
}

/// Fetch every matching row in the requested order.
pub fn fetch_many<R: Record>(conn: &Connection, predicate: &Predicate, order: &Order) -> Result<Vec<R>> {
    let (filter, values) = predicate.to_sql();
    let sql = format!(
        "SELECT {} FROM {}{filter}{}",
        R::COLUMNS.join(", "),
        R::TABLE,
        order.to_sql()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| R::from_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::from_sqlite(R::TABLE, e))?;
    Ok(rows)
}

/// Update matching rows; returns how many changed.
pub fn update_row(
    conn: &Connection,
    table: &'static str,
    predicate: &Predicate,
    columns: &[(&'static str, Value)],
) -> Result<usize> {
    if columns.is_empty() {
        return Ok(0);
    }

    let (filter, filter_values) = predicate.to_sql();
    let assignments: Vec<String> = columns.iter().map(|(name, _)| format!("{name} = ?")).collect();
    let sql = format!("UPDATE {table} SET {}{filter}", assignments.join(", "));

    let values = columns.iter().map(|(_, value)| value).chain(filter_values.iter());
    conn.execute(&sql, params_from_iter(values))
        .map_err(|e| Error::from_sqlite(table, e))
}

/// Delete matching rows; returns how many were removed.
pub fn delete_row(conn: &Connection, table: &'static str, predicate: &Predicate) -> Result<usize> {
    let (filter, values) = predicate.to_sql();
    conn.execute(&format!("DELETE FROM {table}{filter}"), params_from_iter(values.iter()))
        .map_err(|e| Error::from_sqlite(table, e))
}

/// Count matching rows
pub fn count(conn: &Connection, table: &'static str, predicate: &Predicate) -> Result<i64> {
    let (filter, values) = predicate.to_sql();
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table}{filter}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )
    .map_err(|e| Error::from_sqlite(table, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        id: i64,
        name: String,
        rank: i64,
        tag: Option<String>,
    }

    impl Record for Item {
        const TABLE: &'static str = "items";
        const COLUMNS: &'static [&'static str] = &["id", "name", "rank", "tag"];

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Item {
                id: row.get(0)?,
                name: row.get(1)?,
                rank: row.get(2)?,
                tag: row.get(3)?,
            })
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                rank INTEGER NOT NULL,
                tag TEXT
            )",
        )
        .unwrap();
        conn
    }

    fn insert_item(conn: &Connection, name: &str, rank: i64, tag: Option<&str>) -> i64 {
        insert_row(
            conn,
            "items",
            &[
                ("name", Value::Text(name.to_string())),
                ("rank", Value::Integer(rank)),
                ("tag", nullable_text(tag)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_insert_returns_generated_ids() {
        let conn = test_conn();
        let first = insert_item(&conn, "a", 1, None);
        let second = insert_item(&conn, "b", 2, None);
        assert!(second > first);
    }

    #[test]
    fn test_insert_duplicate_is_duplicate_key() {
        let conn = test_conn();
        insert_item(&conn, "a", 1, None);
        let err = insert_row(
            &conn,
            "items",
            &[("name", Value::Text("a".into())), ("rank", Value::Integer(9))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { table: "items", .. }));
    }

    #[test]
    fn test_fetch_one_distinguishes_missing_from_fault() {
        let conn = test_conn();
        let id = insert_item(&conn, "a", 1, Some("x"));

        let found: Option<Item> = fetch_one(&conn, &Predicate::eq("id", id)).unwrap();
        assert_eq!(found.unwrap().tag.as_deref(), Some("x"));

        let missing: Option<Item> = fetch_one(&conn, &Predicate::eq("name", "zzz".to_string())).unwrap();
        assert!(missing.is_none());

        conn.execute_batch("DROP TABLE items").unwrap();
        let fault = fetch_one::<Item>(&conn, &Predicate::all()).unwrap_err();
        assert!(fault.is_storage_fault());
    }

    #[test]
    fn test_fetch_many_order_is_stable() {
        let conn = test_conn();
        insert_item(&conn, "c", 2, None);
        insert_item(&conn, "a", 1, Some("t"));
        insert_item(&conn, "b", 2, None);

        let order = Order::by("rank", Direction::Desc);
        let names = |items: Vec<Item>| items.into_iter().map(|i| i.name).collect::<Vec<_>>();

        let first = names(fetch_many(&conn, &Predicate::all(), &order).unwrap());
        let second = names(fetch_many(&conn, &Predicate::all(), &order).unwrap());
        assert_eq!(first, vec!["c", "b", "a"]);
        assert_eq!(first, second);

        let untagged: Vec<Item> =
            fetch_many(&conn, &Predicate::all().and_is_null("tag"), &Order::default()).unwrap();
        assert_eq!(untagged.len(), 2);

        let ranked: Vec<Item> =
            fetch_many(&conn, &Predicate::all().and_gt("rank", 1), &Order::default()).unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_update_and_delete_report_counts() {
        let conn = test_conn();
        insert_item(&conn, "a", 1, None);
        insert_item(&conn, "b", 1, None);

        let changed = update_row(&conn, "items", &Predicate::eq("rank", 1), &[("tag", Value::Text("t".into()))]).unwrap();
        assert_eq!(changed, 2);

        let noop = update_row(&conn, "items", &Predicate::eq("rank", 7), &[("tag", Value::Null)]).unwrap();
        assert_eq!(noop, 0);

        assert_eq!(delete_row(&conn, "items", &Predicate::eq("name", "a".to_string())).unwrap(), 1);
        assert_eq!(count(&conn, "items", &Predicate::all()).unwrap(), 1);
    }
}
