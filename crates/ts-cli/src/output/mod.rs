//! Output formatting utilities for the CLI
//!
//! Tables for stored profiles and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use ts_core::ConnectionProfile;

/// Format stored profiles as an ASCII table
///
/// Returns "No profiles stored" if the list is empty.
pub fn format_profiles(profiles: &[ConnectionProfile]) -> String {
    if profiles.is_empty() {
        return "No profiles stored".to_string();
    }

    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "ADDRESS")]
        address: String,
        #[tabled(rename = "USER")]
        username: String,
        #[tabled(rename = "AUTH")]
        auth: String,
        #[tabled(rename = "TIMEOUT")]
        timeout: String,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .map(|p| ProfileRow {
            id: p.id.to_string(),
            name: truncate(&p.name, 24),
            address: p.address(),
            username: p.username.clone(),
            auth: p.auth.method().to_string(),
            timeout: p
                .handshake_timeout
                .map(|t| format!("{}s", t.as_secs()))
                .unwrap_or_else(|| "default".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_table() {
        assert_eq!(format_profiles(&[]), "No profiles stored");
    }

    #[test]
    fn test_profile_table_hides_secrets() {
        let profile = ConnectionProfile::with_password("web", "web.lan", "deploy", "s3cret");
        let table = format_profiles(&[profile]);
        assert!(table.contains("web.lan:22"));
        assert!(table.contains("password"));
        assert!(!table.contains("s3cret"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
