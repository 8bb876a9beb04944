use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

/// Every heading in the CLI: optional icon, styled title, optional dimmed
/// subtitle underneath.
fn heading(icon: Option<&str>, title: &str, subtitle: Option<&str>) {
    let title = title.style(theme().header.clone());
    match icon {
        Some(icon) => println!("{icon} {title}"),
        None => println!("{title}"),
    }
    if let Some(subtitle) = subtitle {
        println!("   {}", subtitle.style(theme().dim.clone()));
    }
}

pub fn header(text: &str) {
    heading(Some(Icons::ROCKET), text, None);
}

/// Report title with the store it describes underneath
pub fn banner(title: &str, subtitle: &str) {
    println!();
    heading(Some(Icons::STAR), title, Some(subtitle));
    println!();
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

/// Sub-heading inside a report, separated by a blank line
pub fn section(title: &str) {
    println!();
    heading(None, title, None);
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
