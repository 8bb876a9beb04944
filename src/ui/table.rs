use tabled::{settings::Style, Table, Tabled};

use crate::dao::UserSummary;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Admin")]
    admin: &'static str,
    #[tabled(rename = "Progress")]
    progress: i64,
    #[tabled(rename = "Notes")]
    notes: i64,
    #[tabled(rename = "Sessions")]
    sessions: i64,
    #[tabled(rename = "Quizzes")]
    quizzes: i64,
}

/// Admin listing, one row per user
pub fn users_table(users: &[UserSummary]) -> String {
    let rows: Vec<UserRow> = users
        .iter()
        .map(|user| UserRow {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone().unwrap_or_else(|| "-".to_string()),
            admin: super::yes_no(user.is_admin),
            progress: user.progress_items,
            notes: user.notes_count,
            sessions: user.study_sessions,
            quizzes: user.quiz_attempts,
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_table() {
        assert!(TableBuilder::new().build().is_empty());
    }

    #[test]
    fn test_stats_table_contains_rows() {
        let table = stats_table(&[("Users", "3"), ("Notes", "12")]);
        assert!(table.contains("Metric"));
        assert!(table.contains("Users"));
        assert!(table.contains("12"));
    }

    #[test]
    fn test_users_table() {
        let users = vec![UserSummary {
            id: 7,
            username: "alice".into(),
            email: None,
            is_admin: true,
            created_at: "2026-10-17T09:30:00.000Z".into(),
            progress_items: 2,
            notes_count: 1,
            study_sessions: 0,
            quiz_attempts: 4,
        }];
        let table = users_table(&users);
        assert!(table.contains("alice"));
        assert!(table.contains("yes"));
    }
}
