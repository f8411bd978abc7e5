//! User-facing notifications.

use std::time::{Duration, Instant};

pub const SUCCESS_TITLE: &str = "Success";
pub const SUCCESS_MESSAGE: &str = "Record Updates Succeeded!";
pub const ERROR_TITLE: &str = "Error";

/// How long a toast stays on screen
const TOAST_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Success,
  Error,
}

/// A transient notification shown in the status line
#[derive(Debug, Clone)]
pub struct Toast {
  pub title: String,
  pub message: String,
  pub severity: Severity,
  shown_at: Instant,
}

impl Toast {
  pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
    Self {
      title: title.into(),
      message: message.into(),
      severity,
      shown_at: Instant::now(),
    }
  }

  pub fn saved() -> Self {
    Self::new(SUCCESS_TITLE, SUCCESS_MESSAGE, Severity::Success)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(ERROR_TITLE, message, Severity::Error)
  }

  pub fn is_expired(&self) -> bool {
    self.shown_at.elapsed() > TOAST_TTL
  }
}
