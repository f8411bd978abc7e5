use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::filter::{encode_label, ALL_TYPES_LABEL};

pub const FIELD_NAME: &str = "Name";
pub const FIELD_TYPE: &str = "Type";

/// Stable identifier of one account record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RecordId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

/// Account row as delivered by the record query service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
  pub id: RecordId,
  pub name: String,
  #[serde(rename = "Type", default)]
  pub account_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<DateTime<Utc>>,
}

impl Account {
  /// Read a grid field by its API name
  pub fn field(&self, field: &str) -> Option<&str> {
    match field {
      FIELD_NAME => Some(&self.name),
      FIELD_TYPE => self.account_type.as_deref(),
      _ => None,
    }
  }
}

/// Grid column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub label: &'static str,
  pub field: &'static str,
  pub editable: bool,
}

/// Columns shown in the account grid. `Type` stays read-only so an edit can
/// never move a record between filtered views.
pub const COLUMNS: &[Column] = &[
  Column {
    label: "Name",
    field: FIELD_NAME,
    editable: true,
  },
  Column {
    label: "Type",
    field: FIELD_TYPE,
    editable: false,
  },
];

/// Entry of the type selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOption {
  pub label: String,
  pub value: String,
}

impl TypeOption {
  /// Build selector options from the category listing, with the
  /// unfiltered option first.
  pub fn from_labels(labels: &[String]) -> Vec<TypeOption> {
    let mut options = Vec::with_capacity(labels.len() + 1);
    options.push(TypeOption {
      label: ALL_TYPES_LABEL.to_string(),
      value: String::new(),
    });
    options.extend(labels.iter().map(|label| TypeOption {
      label: label.clone(),
      value: encode_label(label),
    }));
    options
  }
}

/// Field changes for one record, keyed by field API name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEdit {
  pub id: RecordId,
  pub fields: BTreeMap<String, String>,
}
