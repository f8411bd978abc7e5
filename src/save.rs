//! Draft edits and the save batch.

use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::error::ViewError;
use crate::records::types::{RecordEdit, RecordId, COLUMNS};
use crate::records::AccountService;

/// Unsaved grid edits, grouped per record
#[derive(Debug, Clone, Default)]
pub struct DraftEdits {
  edits: BTreeMap<RecordId, BTreeMap<String, String>>,
}

impl DraftEdits {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stage a field value. Returns false for fields the grid does not allow
  /// editing.
  pub fn set(&mut self, id: RecordId, field: &str, value: String) -> bool {
    let editable = COLUMNS.iter().any(|c| c.field == field && c.editable);
    if !editable {
      return false;
    }
    self
      .edits
      .entry(id)
      .or_default()
      .insert(field.to_string(), value);
    true
  }

  /// Staged value for one cell
  pub fn get(&self, id: &RecordId, field: &str) -> Option<&str> {
    self
      .edits
      .get(id)
      .and_then(|fields| fields.get(field))
      .map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.edits.is_empty()
  }

  /// Number of records with staged edits
  pub fn len(&self) -> usize {
    self.edits.len()
  }

  pub fn clear(&mut self) {
    self.edits.clear();
  }

  /// One update request per edited record
  pub fn to_batch(&self) -> Vec<RecordEdit> {
    self
      .edits
      .iter()
      .map(|(id, fields)| RecordEdit {
        id: id.clone(),
        fields: fields.clone(),
      })
      .collect()
  }
}

/// Submit every edit as its own update request and wait for all of them.
///
/// The batch succeeds only if every request succeeds; the mutated ids are
/// returned only in that case. On failure the first error message is
/// returned and nothing should be invalidated.
pub async fn save_batch<S: AccountService>(
  service: &S,
  batch: &[RecordEdit],
) -> Result<HashSet<RecordId>, ViewError> {
  let results = join_all(
    batch
      .iter()
      .map(|edit| service.update_record(&edit.id, &edit.fields)),
  )
  .await;

  let mut first_error = None;
  for (edit, result) in batch.iter().zip(results) {
    if let Err(e) = result {
      warn!(record = %edit.id, error = %e, "record update failed");
      first_error.get_or_insert_with(|| e.to_string());
    }
  }

  if let Some(message) = first_error {
    return Err(ViewError::Update(message));
  }

  info!(records = batch.len(), "save batch succeeded");
  Ok(batch.iter().map(|edit| edit.id.clone()).collect())
}
