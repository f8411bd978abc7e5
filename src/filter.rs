//! Filter keys and the mapping between type labels and transport values.
//!
//! Type labels may contain spaces ("Customer - Direct"), which the query
//! transport does not accept in option values. Option values therefore carry
//! the label with spaces replaced by `_`, and a selection is decoded back to
//! the label before it is used as a cache key or sent as a query parameter.

use serde::{Deserialize, Serialize};
use std::fmt;

const SPACE_PLACEHOLDER: char = '_';

/// Label shown for the unfiltered view
pub const ALL_TYPES_LABEL: &str = "All Types";

/// Normalized account type label selecting one filtered view.
///
/// The empty key means "no filter" and selects every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterKey(String);

impl FilterKey {
  /// Key for the unfiltered view
  pub fn all() -> Self {
    Self(String::new())
  }

  /// Build a key directly from a type label
  pub fn from_label(label: impl Into<String>) -> Self {
    Self(label.into())
  }

  /// Decode a selected option value back into a key. See `decode_value`
  /// for labels containing `_`.
  pub fn from_option_value(value: &str) -> Self {
    Self(decode_value(value))
  }

  pub fn is_all(&self) -> bool {
    self.0.is_empty()
  }

  /// The type label this key filters on (empty for all records)
  pub fn label(&self) -> &str {
    &self.0
  }

  /// The transport-safe option value for this key
  pub fn option_value(&self) -> String {
    encode_label(&self.0)
  }
}

impl fmt::Display for FilterKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_all() {
      f.write_str(ALL_TYPES_LABEL)
    } else {
      f.write_str(&self.0)
    }
  }
}

/// Replace spaces in a type label with the transport placeholder
pub fn encode_label(label: &str) -> String {
  label.replace(' ', &SPACE_PLACEHOLDER.to_string())
}

/// Turn a transport value back into the type label.
///
/// Decoding is lossy: every `_` becomes a space, including underscores that
/// were part of the label. A label such as `Foo_Bar` therefore decodes to
/// `Foo Bar` and selects an empty view. Type labels are expected not to
/// contain `_`.
pub fn decode_value(value: &str) -> String {
  value.replace(SPACE_PLACEHOLDER, " ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_label_with_space_round_trips() {
    let label = "Customer - Direct";
    let value = encode_label(label);
    assert_eq!(value, "Customer_-_Direct");
    assert_eq!(FilterKey::from_option_value(&value).label(), label);
  }

  #[test]
  fn test_empty_value_is_all() {
    let key = FilterKey::from_option_value("");
    assert!(key.is_all());
    assert_eq!(key, FilterKey::all());
    assert_eq!(key.to_string(), ALL_TYPES_LABEL);
  }

  #[test]
  fn test_option_value_matches_encode() {
    let key = FilterKey::from_label("Technology Partner");
    assert_eq!(key.option_value(), "Technology_Partner");
    assert_eq!(key.to_string(), "Technology Partner");
  }

  #[test]
  fn test_underscore_in_label_decodes_as_space() {
    let value = encode_label("Foo_Bar");
    assert_eq!(value, "Foo_Bar");
    assert_eq!(FilterKey::from_option_value(&value).label(), "Foo Bar");
  }
}
