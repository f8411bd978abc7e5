use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::error;

use crate::cache::RefreshOutcome;
use crate::error::ViewError;
use crate::filter::FilterKey;
use crate::query::ViewHandle;
use crate::records::types::{Account, RecordId};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and toast expiry
  Tick,
  /// Result of a background task
  App(AppEvent),
  /// Terminal input can no longer be read
  InputError(String),
}

/// Completions reported by spawned fetch, save and refresh tasks
#[derive(Debug)]
pub enum AppEvent {
  /// Category listing finished
  TypesLoaded(Result<Vec<String>, String>),
  /// First fetch of a filter finished
  ViewFetched {
    key: FilterKey,
    seq: u64,
    handle: ViewHandle<Vec<Account>>,
    result: Result<Vec<Account>, String>,
  },
  /// Save batch finished; carries the mutated ids on success
  Saved(Result<HashSet<RecordId>, ViewError>),
  /// An invalidated view finished refreshing
  Refreshed(RefreshOutcome<Account>),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let input_tx = tx.clone();

    // Terminal polling blocks, so keep it off the async workers
    tokio::task::spawn_blocking(move || loop {
      match event::poll(tick_rate) {
        Ok(true) => {
          if let Ok(CrosstermEvent::Key(key)) = event::read() {
            if key.kind == KeyEventKind::Press && input_tx.send(Event::Key(key)).is_err() {
              break;
            }
          }
        }
        Ok(false) => {
          if input_tx.send(Event::Tick).is_err() {
            break;
          }
        }
        Err(e) => {
          // Polling fails on every call once the terminal is gone
          error!(error = %e, "terminal poll failed");
          let _ = input_tx.send(Event::InputError(e.to_string()));
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks to report completions
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
