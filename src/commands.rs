use std::path::Path;

use anyhow::Context;
use owo_colors::OwoColorize;

use crate::{NoteCommand, OutputMode, ProgressCommand, QuizCommand, SessionCommand, emit_success};
use portal_db::Portal;
use portal_db::config::{self, PortalConfig};
use portal_db::facade;
use portal_db::ui::{
    Icons, banner, dim, header, info, muted, section, stats_table, status, success, summary_row, theme, users_table,
    warn, yes_no,
};

pub fn run_config(output_mode: OutputMode, path: &Path, defaults: &PortalConfig, force: bool) -> anyhow::Result<()> {
    config::write_config(path, defaults, force)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "config", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, portal: &Portal) -> anyhow::Result<()> {
    let users = facade::get_all_users(portal)?;
    let admins: Vec<&str> = users
        .iter()
        .filter(|user| user.is_admin)
        .map(|user| user.username.as_str())
        .collect();

    if output_mode.is_human() {
        header("Portal store ready");
        status(Icons::DATABASE, "Database", &portal.database().path().display().to_string());
        status(Icons::PERSON, "Users", &users.len().to_string());
        status(Icons::CROWN, "Admins", &admins.join(", "));
    } else {
        let data = serde_json::json!({
            "database": portal.database().path().display().to_string(),
            "users": users.len(),
            "admins": admins,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub fn run_stats(output_mode: OutputMode, portal: &Portal) -> anyhow::Result<()> {
    let stats = facade::get_system_statistics(portal)?;

    if !output_mode.is_human() {
        return emit_success(output_mode, "stats", &stats);
    }

    banner(
        &format!("{} Portal Statistics", Icons::STATS),
        &portal.database().path().display().to_string(),
    );

    let rows = [
        ("Users", stats.total_users.to_string()),
        ("Admins", stats.admin_users.to_string()),
        ("New users (7 days)", stats.new_users_7_days.to_string()),
        ("Progress entries", stats.total_progress_entries.to_string()),
        ("Topics completed", stats.total_topics_completed.to_string()),
        ("Completion rate", format!("{:.1}%", stats.completion_rate)),
        ("Notes", stats.total_notes.to_string()),
        ("Quiz attempts", stats.total_quiz_attempts.to_string()),
        ("Average quiz score", format!("{:.1}%", stats.avg_quiz_score)),
        ("Study sessions", stats.total_study_sessions.to_string()),
        ("Study minutes", stats.total_study_minutes.to_string()),
    ];
    let rows: Vec<(&str, &str)> = rows.iter().map(|(label, value)| (*label, value.as_str())).collect();
    println!("{}", stats_table(&rows));

    if !stats.most_active_chapters.is_empty() {
        section("Most active chapters");
        for chapter in &stats.most_active_chapters {
            summary_row(&chapter.chapter_id, &format!("{} completions", chapter.completion_count));
        }
    }
    Ok(())
}

pub fn run_users(output_mode: OutputMode, portal: &Portal) -> anyhow::Result<()> {
    let users = facade::get_all_users(portal)?;

    if output_mode.is_human() {
        println!("{}", users_table(&users));
    } else {
        emit_success(output_mode, "users", &users)?;
    }
    Ok(())
}

pub fn run_user(output_mode: OutputMode, portal: &Portal, user_id: i64) -> anyhow::Result<()> {
    let details = facade::get_user_details(portal, user_id)?
        .with_context(|| format!("user {user_id} not found"))?;

    if !output_mode.is_human() {
        return emit_success(output_mode, "user", &details);
    }

    header(&details.user.username);
    info("Email", details.user.email.as_deref().unwrap_or("-"));
    info("Admin", yes_no(details.user.is_admin));
    info("Joined", &details.user.created_at);

    section("Activity");
    summary_row(
        "Topics:",
        &format!(
            "{}/{} completed ({:.1}%)",
            details.progress.completed_topics, details.progress.total_topics, details.progress.completion_percentage
        ),
    );
    summary_row(
        "Quizzes:",
        &format!("{} attempts, avg {:.1}%", details.quiz.attempts, details.quiz.avg_score),
    );
    summary_row(
        "Study:",
        &format!("{} sessions, {} minutes", details.study.sessions, details.study.total_minutes),
    );
    Ok(())
}

pub fn run_login(
    output_mode: OutputMode,
    portal: &Portal,
    username: &str,
    email: Option<&str>,
    is_admin: bool,
) -> anyhow::Result<()> {
    let user_id = facade::get_or_create_user(portal, username, email, is_admin)?;

    if output_mode.is_human() {
        status(Icons::PERSON, username, &user_id.to_string());
    } else {
        emit_success(output_mode, "login", serde_json::json!({ "username": username, "user_id": user_id }))?;
    }
    Ok(())
}

pub fn run_set_email(output_mode: OutputMode, portal: &Portal, user_id: i64, email: &str) -> anyhow::Result<()> {
    let change = facade::update_user_metadata(portal, user_id, email)?;

    if output_mode.is_human() {
        let previous = change.previous_email.as_deref().unwrap_or("-");
        success(&format!("Email updated ({} -> {})", muted(previous), email));
    } else {
        emit_success(output_mode, "set-email", &change)?;
    }
    Ok(())
}

pub fn run_promote(output_mode: OutputMode, portal: &Portal, username: &str, is_admin: bool) -> anyhow::Result<()> {
    let changed = facade::set_admin_status(portal, username, is_admin)?;

    if output_mode.is_human() {
        match (changed, is_admin) {
            (false, _) => warn(&format!("No user named {username}")),
            (true, true) => success(&format!("{username} is now an admin")),
            (true, false) => success(&format!("{username} is no longer an admin")),
        }
    } else {
        let data = serde_json::json!({ "username": username, "is_admin": is_admin, "changed": changed });
        emit_success(output_mode, "promote", data)?;
    }
    Ok(())
}

pub fn run_delete_user(output_mode: OutputMode, portal: &Portal, user_id: i64, acting_admin: &str) -> anyhow::Result<()> {
    let admin = portal
        .users()
        .get_by_username(acting_admin)?
        .filter(|user| user.is_admin)
        .with_context(|| format!("{acting_admin} is not an admin"))?;

    facade::delete_user(portal, user_id, admin.id)?;

    if output_mode.is_human() {
        println!("{} {}", Icons::DEL, format!("Deleted user {user_id}").style(theme().warn.clone()));
    } else {
        emit_success(output_mode, "delete-user", serde_json::json!({ "user_id": user_id }))?;
    }
    Ok(())
}

pub fn run_progress(output_mode: OutputMode, portal: &Portal, cmd: ProgressCommand) -> anyhow::Result<()> {
    match cmd {
        ProgressCommand::Set { user_id, chapter, topic, incomplete } => {
            facade::update_topic_progress(portal, user_id, &chapter, &topic, !incomplete)?;
            if output_mode.is_human() {
                let state = if incomplete { "incomplete" } else { "complete" };
                success(&format!("{chapter}/{topic} marked {state}"));
            } else {
                let data = serde_json::json!({
                    "user_id": user_id,
                    "chapter_id": chapter,
                    "topic_id": topic,
                    "is_completed": !incomplete,
                });
                emit_success(output_mode, "progress-set", data)?;
            }
        }
        ProgressCommand::Show { user_id } => {
            let progress = facade::get_user_progress(portal, user_id)?;
            let chapters = facade::get_chapter_completion_stats(portal, user_id)?;

            if !output_mode.is_human() {
                let data = serde_json::json!({ "progress": progress, "chapters": chapters });
                return emit_success(output_mode, "progress", data);
            }

            if progress.is_empty() {
                println!("{}", dim("No progress recorded."));
            }
            for (chapter_id, topics) in &progress {
                let heading = match chapters.get(chapter_id) {
                    Some(stats) => format!("{chapter_id} ({:.0}%)", stats.completion_percentage),
                    None => chapter_id.clone(),
                };
                section(&heading);
                for (topic_id, topic) in topics {
                    let mark = if topic.is_completed { Icons::CHECK } else { Icons::CLOCK };
                    summary_row(mark, &format!("{topic_id} {}", muted(&topic.updated_at)));
                }
            }
        }
    }
    Ok(())
}

pub fn run_note(output_mode: OutputMode, portal: &Portal, cmd: NoteCommand) -> anyhow::Result<()> {
    match cmd {
        NoteCommand::Add { user_id, chapter, content } => {
            facade::add_user_note(portal, user_id, &chapter, &content)?;
            if output_mode.is_human() {
                success(&format!("Note saved to {chapter}"));
            } else {
                emit_success(output_mode, "note-add", serde_json::json!({ "user_id": user_id, "chapter_id": chapter }))?;
            }
        }
        NoteCommand::List { user_id, chapter } => {
            let notes = facade::get_user_notes(portal, user_id, chapter.as_deref())?;
            if !output_mode.is_human() {
                return emit_success(output_mode, "notes", &notes);
            }

            if notes.is_empty() {
                println!("{}", dim("No notes."));
            }
            for note in &notes {
                println!("{} {} {}", Icons::MOD, note.chapter_id.style(theme().info.clone()), muted(&note.created_at));
                println!("   {}", note.content);
            }
        }
    }
    Ok(())
}

pub fn run_quiz(output_mode: OutputMode, portal: &Portal, cmd: QuizCommand) -> anyhow::Result<()> {
    match cmd {
        QuizCommand::Record { user_id, total, correct, chapter } => {
            facade::record_quiz_result(portal, user_id, total, correct, chapter.as_deref())?;
            if output_mode.is_human() {
                success(&format!("Recorded {correct}/{total}"));
            } else {
                let data = serde_json::json!({
                    "user_id": user_id,
                    "total_questions": total,
                    "correct_answers": correct,
                    "chapter_id": chapter,
                });
                emit_success(output_mode, "quiz-record", data)?;
            }
        }
        QuizCommand::List { user_id } => {
            let results = facade::get_quiz_results(portal, user_id)?;
            if !output_mode.is_human() {
                return emit_success(output_mode, "quiz", &results);
            }

            if results.is_empty() {
                println!("{}", dim("No quiz attempts."));
            }
            for result in &results {
                let score = result
                    .score_percent()
                    .map(|score| format!("{score:.1}%"))
                    .unwrap_or_else(|| "-".to_string());
                summary_row(
                    &result.created_at,
                    &format!(
                        "{}/{} ({score}) {}",
                        result.correct_answers,
                        result.total_questions,
                        result.chapter_id.as_deref().unwrap_or("")
                    ),
                );
            }
        }
    }
    Ok(())
}

pub fn run_session(output_mode: OutputMode, portal: &Portal, cmd: SessionCommand) -> anyhow::Result<()> {
    match cmd {
        SessionCommand::Start { user_id, chapter } => {
            let session_id = facade::start_study_session(portal, user_id, &chapter)?;
            if output_mode.is_human() {
                status(Icons::BOOK, "Session started", &session_id.to_string());
            } else {
                emit_success(output_mode, "session-start", serde_json::json!({ "session_id": session_id }))?;
            }
        }
        SessionCommand::End { session_id } => {
            let minutes = facade::end_study_session(portal, session_id)?;
            if output_mode.is_human() {
                status(Icons::CLOCK, "Session finished", &format!("{minutes} minutes"));
            } else {
                let data = serde_json::json!({ "session_id": session_id, "duration_minutes": minutes });
                emit_success(output_mode, "session-end", data)?;
            }
        }
        SessionCommand::List { user_id } => {
            let sessions = facade::get_study_sessions(portal, user_id)?;
            if !output_mode.is_human() {
                return emit_success(output_mode, "sessions", &sessions);
            }

            if sessions.is_empty() {
                println!("{}", dim("No study sessions."));
            }
            for session in &sessions {
                let length = match session.duration_minutes {
                    Some(minutes) => format!("{minutes} min"),
                    None => "open".to_string(),
                };
                summary_row(&session.start_time, &format!("{} {}", session.chapter_id, muted(&length)));
            }
        }
    }
    Ok(())
}
