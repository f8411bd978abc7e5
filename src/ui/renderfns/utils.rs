use ratatui::prelude::Color;

use crate::notify::Severity;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a notification
pub fn severity_color(severity: Severity) -> Color {
  match severity {
    Severity::Success => Color::Green,
    Severity::Error => Color::Red,
  }
}
