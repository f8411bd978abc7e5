//! Invalidation of cached views after a save.
//!
//! A view is stale when any record it held at its last fetch was mutated.
//! This is conservative: an edit that moves a record into a filter it was not
//! part of is not detected, because only the old membership is known.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::traits::Record;
use super::view_cache::{FilteredViewCache, RefreshFuture};
use crate::error::{RefetchError, ViewError};
use crate::filter::FilterKey;
use crate::records::types::RecordId;

/// Result of refreshing one stale view
#[derive(Debug)]
pub struct RefreshOutcome<T> {
  pub key: FilterKey,
  pub result: Result<Vec<T>, ViewError>,
}

/// A refresh that has been requested from the cache but not yet awaited.
///
/// Owns everything it needs, so it can be spawned onto the runtime or
/// awaited in place.
pub struct PendingRefresh<T> {
  key: FilterKey,
  refresh: Result<RefreshFuture<T>, ViewError>,
}

impl<T: Record> PendingRefresh<T> {
  /// Ask the cache to refresh `key`.
  pub fn request(cache: &mut FilteredViewCache<T>, key: FilterKey) -> Self {
    let refresh = cache.refresh(&key);
    Self { key, refresh }
  }

  pub fn key(&self) -> &FilterKey {
    &self.key
  }

  /// Wait for the refresh. Failures are logged here and reported in the
  /// outcome; they never affect other pending refreshes.
  ///
  /// A refresh overtaken by a newer one for the same view resolves to
  /// `ViewError::Superseded` so its result is never applied.
  pub async fn run(self) -> RefreshOutcome<T> {
    let result = match self.refresh {
      Ok(refresh) => refresh.await.map_err(|e| match e {
        RefetchError::Failed(message) => ViewError::Fetch(message),
        RefetchError::Superseded => ViewError::Superseded(self.key.clone()),
      }),
      Err(e) => Err(e),
    };

    match &result {
      Ok(records) => info!(filter = %self.key, records = records.len(), "view refreshed"),
      Err(ViewError::Superseded(_)) => debug!(filter = %self.key, "refresh superseded"),
      Err(e) => warn!(filter = %self.key, error = %e, "view refresh failed"),
    }

    RefreshOutcome {
      key: self.key,
      result,
    }
  }
}

/// Cached keys made stale by mutating `mutated`.
pub fn stale_keys<T: Record>(
  cache: &FilteredViewCache<T>,
  mutated: &HashSet<RecordId>,
) -> Vec<FilterKey> {
  cache.keys_containing_any(mutated)
}

/// Request a refresh for every view made stale by `mutated`.
///
/// Returns one pending refresh per stale key, in key order. Nothing is
/// requested when `mutated` is empty or the cache holds no views.
pub fn plan_refreshes<T: Record>(
  cache: &mut FilteredViewCache<T>,
  mutated: &HashSet<RecordId>,
) -> Vec<PendingRefresh<T>> {
  let keys = stale_keys(cache, mutated);
  if !keys.is_empty() {
    info!(mutated = mutated.len(), stale = keys.len(), "invalidating cached views");
  }

  keys
    .into_iter()
    .map(|key| PendingRefresh::request(cache, key))
    .collect()
}

/// Refresh every stale view concurrently and re-record the identifier sets
/// of the ones that succeeded.
#[cfg(test)]
pub async fn refresh_stale<T: Record>(
  cache: &mut FilteredViewCache<T>,
  mutated: &HashSet<RecordId>,
) -> Vec<RefreshOutcome<T>> {
  let pending = plan_refreshes(cache, mutated);
  let outcomes = futures::future::join_all(pending.into_iter().map(PendingRefresh::run)).await;

  for outcome in &outcomes {
    cache.apply_refresh(outcome);
  }

  outcomes
}
