use rusqlite::Row;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::instrument;

use crate::storage::base::{self, Direction, Order, Predicate, Record};
use crate::storage::{Database, now_timestamp};
use crate::{Error, Result};
use super::missing_user;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub chapter_id: String,
    pub content: String,
    pub created_at: String,
}

impl Record for Note {
    const TABLE: &'static str = "user_notes";
    const COLUMNS: &'static [&'static str] = &["id", "user_id", "chapter_id", "content", "created_at"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Note {
            id: row.get(0)?,
            user_id: row.get(1)?,
            chapter_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

pub struct NotesDao {
    db: Database,
}

impl NotesDao {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a note; blank content is rejected before touching storage.
    #[instrument(skip(self, content))]
    pub fn add_note(&self, user_id: i64, chapter_id: &str, content: &str) -> Result<bool> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("note content must not be empty".into()));
        }

        self.db.transaction(|tx| {
            base::insert_row(
                tx,
                Note::TABLE,
                &[
                    ("user_id", Value::Integer(user_id)),
                    ("chapter_id", Value::Text(chapter_id.to_owned())),
                    ("content", Value::Text(content.to_owned())),
                    ("created_at", Value::Text(now_timestamp())),
                ],
            )
            .map_err(missing_user(user_id))
        })?;
        Ok(true)
    }

    /// Notes for a user, most recent first, optionally for one chapter.
    pub fn get_notes(&self, user_id: i64, chapter_id: Option<&str>) -> Result<Vec<Note>> {
        let mut filter = Predicate::eq("user_id", user_id);
        if let Some(chapter_id) = chapter_id {
            filter = filter.and_eq("chapter_id", chapter_id.to_owned());
        }

        self.db.query(|conn| {
            base::fetch_many(
                conn,
                &filter,
                &Order::by("created_at", Direction::Desc).then("id", Direction::Desc),
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
    fn test_notes_most_recent_first() {
        let (_dir, db) = test_db();
        let user = UserDao::new(db.clone()).get_or_create("alice", None, false).unwrap();
        let notes = NotesDao::new(db);

        assert!(notes.get_notes(user, None).unwrap().is_empty());

        for content in ["first", "second", "third"] {
            assert!(notes.add_note(user, "chapter1", content).unwrap());
        }

        let contents: Vec<String> = notes
            .get_notes(user, None)
            .unwrap()
            .into_iter()
            .map(|note| note.content)
            .collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_notes_are_never_merged() {
        let (_dir, db) = test_db();
        let user = UserDao::new(db.clone()).get_or_create("alice", None, false).unwrap();
        let notes = NotesDao::new(db);

        notes.add_note(user, "chapter1", "same").unwrap();
        notes.add_note(user, "chapter1", "same").unwrap();
        notes.add_note(user, "chapter2", "other").unwrap();

        assert_eq!(notes.get_notes(user, None).unwrap().len(), 3);
        assert_eq!(notes.get_notes(user, Some("chapter1")).unwrap().len(), 2);
        assert!(notes.get_notes(user, Some("chapter9")).unwrap().is_empty());
    }

    #[test]
    fn test_blank_note_rejected() {
        let (_dir, db) = test_db();
        let user = UserDao::new(db.clone()).get_or_create("alice", None, false).unwrap();
        let notes = NotesDao::new(db);

        assert!(matches!(notes.add_note(user, "chapter1", ""), Err(Error::InvalidInput(_))));
        assert!(matches!(notes.add_note(user, "chapter1", " \n\t"), Err(Error::InvalidInput(_))));
        assert!(notes.get_notes(user, None).unwrap().is_empty());
    }

    #[test]
    fn test_note_for_unknown_user() {
        let (_dir, db) = test_db();
        let notes = NotesDao::new(db);
        assert!(matches!(notes.add_note(777, "chapter1", "hello"), Err(Error::NotFound { .. })));
    }
}
