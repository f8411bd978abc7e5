//! Core trait for records held in cached views.

use crate::records::types::{Account, RecordId};

/// Trait for records that can appear in a cached filtered view.
///
/// Implementors must expose an identifier that stays stable across fetches
/// and edits; the invalidation resolver matches mutated records by it.
pub trait Record: Clone + Send + Sync + 'static {
  fn record_id(&self) -> &RecordId;
}

impl Record for Account {
  fn record_id(&self) -> &RecordId {
    &self.id
  }
}
