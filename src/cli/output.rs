//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::auth::{Session, UserProfile};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Print where the UI would navigate to
pub fn navigate(route: &str) {
    println!("{} {}", "→".cyan(), route.bold());
}

/// Spinner shown while a request is in flight
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a table describing a user profile
pub fn print_profile_table(profile: &UserProfile) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Field").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![Cell::new("ID"), Cell::new(&profile.id)]);
    table.add_row(vec![Cell::new("Username"), Cell::new(&profile.username)]);
    table.add_row(vec![Cell::new("Email"), Cell::new(&profile.email)]);
    table.add_row(vec![
        Cell::new("Role"),
        Cell::new(&profile.role).fg(Color::Green),
    ]);
    if let Some(avatar) = &profile.avatar_url {
        table.add_row(vec![Cell::new("Avatar"), Cell::new(avatar)]);
    }
    for (key, value) in &profile.extra {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }

    println!("{table}");
}

/// Print session details
pub fn print_session_detail(session: &Session, base_url: &str, storage: &str) {
    println!("{}", "Session".bold().underline());
    println!();
    println!("  {} {}", "API:".bold(), base_url.cyan());
    println!("  {} {}", "Token file:".bold(), storage);

    let state = if session.is_authenticated() {
        "authenticated".green()
    } else {
        "anonymous".red()
    };
    println!("  {} {}", "State:".bold(), state);

    if let Some(user) = session.user() {
        println!("  {} {}", "User:".bold(), user);
        println!("  {} {}", "Role:".bold(), user.role);
    }

    if let Some(expires) = session.access_token_expires_at() {
        let now = chrono::Utc::now();
        let remaining = expires.signed_duration_since(now);
        let note = if session.is_access_token_expired_at(now) {
            "expired, will refresh on next request".yellow().to_string()
        } else {
            format!("in {} min", remaining.num_minutes())
        };
        println!(
            "  {} {} ({})",
            "Access token expires:".bold(),
            expires.format("%Y-%m-%d %H:%M:%S UTC"),
            note
        );
    }

    if let Some(err) = session.last_error() {
        println!("  {} {}", "Last error:".bold(), err.red());
    }
}
