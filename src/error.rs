use thiserror::Error;

use crate::filter::FilterKey;

/// Errors surfaced by the view cache, the invalidation resolver and the save batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
  /// Category listing or record query failed
  #[error("fetch failed: {0}")]
  Fetch(String),

  /// One or more record updates in a save batch failed
  #[error("{0}")]
  Update(String),

  /// Refresh requested for a filter that has never been fetched
  #[error("no cached view for filter {0:?}")]
  UnknownKey(FilterKey),

  /// A newer refresh of the same view was issued before this one finished
  #[error("refresh of filter {0:?} superseded")]
  Superseded(FilterKey),
}

/// Why a `ViewHandle::refetch` produced no data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefetchError {
  /// The fetcher itself failed
  #[error("{0}")]
  Failed(String),

  /// A later refetch of the same handle was started; its result wins
  #[error("superseded by a newer fetch")]
  Superseded,
}
