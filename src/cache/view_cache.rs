//! Per-filter view cache.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use tracing::{debug, error};

use super::resolver::RefreshOutcome;
use super::traits::Record;
use crate::error::{RefetchError, ViewError};
use crate::filter::FilterKey;
use crate::query::ViewHandle;
use crate::records::types::RecordId;

/// Future returned by `FilteredViewCache::refresh`
pub type RefreshFuture<T> = Pin<Box<dyn Future<Output = Result<Vec<T>, RefetchError>> + Send>>;

/// What the cache remembers about one filter key
struct CacheEntry<T> {
  /// Records present in the view as of its last successful fetch
  ids: Vec<RecordId>,
  /// Live handle that can re-run the view's fetch in place
  handle: ViewHandle<Vec<T>>,
  /// Logical clock value of the last record/refresh/touch
  last_used: u64,
}

/// Cache of filtered views, keyed by filter.
///
/// Each key holds the identifier set of its last successful fetch together
/// with the live handle for that view. Both are stored in one entry and
/// inserted or evicted together, so a key never has one without the other.
///
/// Keys are kept in sorted order, which makes `keys_containing_any`
/// deterministic.
///
/// With a capacity set, the least recently used key is evicted to make room,
/// but never the pinned key (the view on screen). When the pinned key is the
/// only candidate the cache holds one entry over capacity until the pin
/// moves.
pub struct FilteredViewCache<T> {
  entries: BTreeMap<FilterKey, CacheEntry<T>>,
  /// Maximum number of keys; `None` keeps every visited filter
  capacity: Option<NonZeroUsize>,
  pinned: Option<FilterKey>,
  clock: u64,
}

impl<T: Record> FilteredViewCache<T> {
  /// Create an unbounded cache.
  pub fn new() -> Self {
    Self {
      entries: BTreeMap::new(),
      capacity: None,
      pinned: None,
      clock: 0,
    }
  }

  /// Create a cache that evicts the least recently used key once
  /// `capacity` keys are stored.
  pub fn with_capacity(capacity: NonZeroUsize) -> Self {
    Self {
      capacity: Some(capacity),
      ..Self::new()
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn contains(&self, key: &FilterKey) -> bool {
    self.entries.contains_key(key)
  }

  /// Cached keys in sorted order
  #[cfg(test)]
  pub fn keys(&self) -> impl Iterator<Item = &FilterKey> {
    self.entries.keys()
  }

  /// Identifier set recorded for `key` at its last fetch
  #[cfg(test)]
  pub fn ids(&self, key: &FilterKey) -> Option<&[RecordId]> {
    self.entries.get(key).map(|e| e.ids.as_slice())
  }

  /// Live handle stored for `key`
  pub fn handle(&self, key: &FilterKey) -> Option<&ViewHandle<Vec<T>>> {
    self.entries.get(key).map(|e| &e.handle)
  }

  /// Record a successful fetch for `key`.
  ///
  /// Replaces both the identifier set and the handle; identifiers from an
  /// earlier fetch of the same key are dropped, never merged. Returns the key
  /// evicted to stay within capacity, if any.
  pub fn record_fetch(
    &mut self,
    key: FilterKey,
    ids: impl IntoIterator<Item = RecordId>,
    handle: ViewHandle<Vec<T>>,
  ) -> Option<FilterKey> {
    let ids: Vec<RecordId> = ids.into_iter().collect();
    let last_used = self.tick();

    let evicted = if self.entries.contains_key(&key) {
      None
    } else {
      self.evict_for_insert(&key)
    };

    debug!(filter = %key, records = ids.len(), "recording fetch");
    self.entries.insert(
      key,
      CacheEntry {
        ids,
        handle,
        last_used,
      },
    );

    evicted
  }

  /// Record a fetch from the delivered records themselves.
  pub fn record_records(
    &mut self,
    key: FilterKey,
    records: &[T],
    handle: ViewHandle<Vec<T>>,
  ) -> Option<FilterKey> {
    let ids = records.iter().map(|r| r.record_id().clone());
    self.record_fetch(key, ids, handle)
  }

  /// Every cached key whose identifier set shares at least one id with `ids`.
  pub fn keys_containing_any(&self, ids: &HashSet<RecordId>) -> Vec<FilterKey> {
    if ids.is_empty() {
      return Vec::new();
    }

    self
      .entries
      .iter()
      .filter(|(_, entry)| entry.ids.iter().any(|id| ids.contains(id)))
      .map(|(key, _)| key.clone())
      .collect()
  }

  /// Tell the handle for `key` to re-fetch.
  ///
  /// The returned future owns its handle and can run alongside refreshes of
  /// other keys. The identifier set for `key` is not touched here; feed the
  /// result back through `apply_refresh` once it completes.
  pub fn refresh(&mut self, key: &FilterKey) -> Result<RefreshFuture<T>, ViewError> {
    let last_used = self.tick();
    match self.entries.get_mut(key) {
      Some(entry) => {
        entry.last_used = last_used;
        debug!(filter = %key, "refreshing view");
        Ok(Box::pin(entry.handle.refetch()))
      }
      None => {
        error!(filter = %key, "refresh requested for a filter with no cached view");
        Err(ViewError::UnknownKey(key.clone()))
      }
    }
  }

  /// Re-record the identifier set of a refreshed view, keeping its handle.
  ///
  /// Failed refreshes and keys evicted while the refresh was in flight leave
  /// the cache unchanged. Returns whether the entry was updated.
  pub fn apply_refresh(&mut self, outcome: &RefreshOutcome<T>) -> bool {
    let records = match &outcome.result {
      Ok(records) => records,
      Err(_) => return false,
    };

    let handle = match self.entries.get(&outcome.key) {
      Some(entry) => entry.handle.clone(),
      None => {
        debug!(filter = %outcome.key, "refreshed view no longer cached");
        return false;
      }
    };

    self.record_records(outcome.key.clone(), records, handle);
    true
  }

  /// Mark `key` as recently used without changing it.
  pub fn touch(&mut self, key: &FilterKey) -> bool {
    let last_used = self.tick();
    match self.entries.get_mut(key) {
      Some(entry) => {
        entry.last_used = last_used;
        true
      }
      None => false,
    }
  }

  /// Protect `key` from eviction, releasing any previous pin, and shrink
  /// back to capacity. Returns the keys evicted.
  ///
  /// `key` does not have to be cached yet.
  pub fn pin(&mut self, key: FilterKey) -> Vec<FilterKey> {
    self.pinned = Some(key);

    let mut evicted = Vec::new();
    if let Some(capacity) = self.capacity {
      while self.entries.len() > capacity.get() {
        match self.evict_lru(None) {
          Some(key) => evicted.push(key),
          None => break,
        }
      }
    }
    evicted
  }

  fn tick(&mut self) -> u64 {
    self.clock += 1;
    self.clock
  }

  /// Make room for `incoming`, returning the evicted key if one was dropped.
  fn evict_for_insert(&mut self, incoming: &FilterKey) -> Option<FilterKey> {
    let capacity = self.capacity?.get();
    if self.entries.len() < capacity {
      return None;
    }

    let evicted = self.evict_lru(Some(incoming));
    if evicted.is_none() {
      debug!(filter = %incoming, "only the pinned view is evictable; exceeding capacity");
    }
    evicted
  }

  /// Drop the least recently used key other than the pinned one and `spare`.
  fn evict_lru(&mut self, spare: Option<&FilterKey>) -> Option<FilterKey> {
    let oldest = self
      .entries
      .iter()
      .filter(|(key, _)| Some(*key) != self.pinned.as_ref() && Some(*key) != spare)
      .min_by_key(|(_, entry)| entry.last_used)
      .map(|(key, _)| key.clone())?;

    self.entries.remove(&oldest);
    debug!(filter = %oldest, "evicted least recently used view");
    Some(oldest)
  }
}

impl<T: Record> Default for FilteredViewCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> std::fmt::Debug for FilteredViewCache<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FilteredViewCache")
      .field("keys", &self.entries.keys().collect::<Vec<_>>())
      .field("capacity", &self.capacity)
      .field("pinned", &self.pinned)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::records::types::Account;

  fn ids(values: &[&str]) -> Vec<RecordId> {
    values.iter().map(|v| RecordId::new(*v)).collect()
  }

  fn id_set(values: &[&str]) -> HashSet<RecordId> {
    ids(values).into_iter().collect()
  }

  fn key(label: &str) -> FilterKey {
    FilterKey::from_label(label)
  }

  fn handle() -> ViewHandle<Vec<Account>> {
    ViewHandle::new(|| async { Ok(Vec::new()) })
  }

  fn account(id: &str, account_type: &str) -> Account {
    Account {
      id: RecordId::new(id),
      name: format!("Account {}", id),
      account_type: Some(account_type.to_string()),
      last_modified: None,
    }
  }

  #[test]
  fn test_recorded_key_found_by_its_ids() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(key("Customer"), ids(&["a", "b", "c"]), handle());

    assert_eq!(cache.keys_containing_any(&id_set(&["c"])), vec![key("Customer")]);
    assert_eq!(
      cache.keys_containing_any(&id_set(&["a", "b", "c"])),
      vec![key("Customer")]
    );
  }

  #[test]
  fn test_disjoint_ids_never_match() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(key("Customer"), ids(&["a", "b"]), handle());
    cache.record_fetch(key("Partner"), ids(&["c", "d"]), handle());

    assert_eq!(cache.keys_containing_any(&id_set(&["b"])), vec![key("Customer")]);
    assert!(cache.keys_containing_any(&id_set(&["x", "y"])).is_empty());
  }

  #[test]
  fn test_empty_id_set_matches_nothing() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());

    assert!(cache.keys_containing_any(&HashSet::new()).is_empty());
  }

  #[test]
  fn test_record_fetch_replaces_not_merges() {
    let mut cache = FilteredViewCache::new();
    let first = handle();
    let second = handle();
    cache.record_fetch(key("Customer"), ids(&["a"]), first.clone());
    cache.record_fetch(key("Customer"), ids(&["z"]), second.clone());

    assert!(cache.keys_containing_any(&id_set(&["a"])).is_empty());
    assert_eq!(cache.keys_containing_any(&id_set(&["z"])), vec![key("Customer")]);
    assert!(cache.handle(&key("Customer")).unwrap().ptr_eq(&second));
    assert!(!cache.handle(&key("Customer")).unwrap().ptr_eq(&first));
  }

  #[test]
  fn test_record_fetch_is_idempotent() {
    let mut cache = FilteredViewCache::new();
    let h = handle();
    cache.record_fetch(key("Customer"), ids(&["a", "b"]), h.clone());
    let before = cache.keys_containing_any(&id_set(&["a", "x"]));
    cache.record_fetch(key("Customer"), ids(&["a", "b"]), h);
    let after = cache.keys_containing_any(&id_set(&["a", "x"]));

    assert_eq!(before, after);
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_every_key_has_ids_and_handle() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(FilterKey::all(), ids(&["a", "b", "c"]), handle());
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());
    cache.record_fetch(key("Customer"), ids(&["b"]), handle());
    cache.record_fetch(key("Partner"), Vec::new(), handle());

    let keys: Vec<FilterKey> = cache.keys().cloned().collect();
    assert_eq!(keys.len(), 3);
    for k in &keys {
      assert!(cache.ids(k).is_some());
      assert!(cache.handle(k).is_some());
    }
  }

  #[test]
  fn test_keys_returned_in_sorted_order() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(key("Prospect"), ids(&["a"]), handle());
    cache.record_fetch(FilterKey::all(), ids(&["a"]), handle());
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());

    assert_eq!(
      cache.keys_containing_any(&id_set(&["a"])),
      vec![FilterKey::all(), key("Customer"), key("Prospect")]
    );
  }

  #[test]
  fn test_record_records_uses_record_ids() {
    let mut cache = FilteredViewCache::new();
    let records = vec![account("001", "Customer"), account("002", "Customer")];
    cache.record_records(key("Customer"), &records, handle());

    assert_eq!(cache.ids(&key("Customer")), Some(ids(&["001", "002"]).as_slice()));
  }

  #[test]
  fn test_refresh_unknown_key() {
    let mut cache: FilteredViewCache<Account> = FilteredViewCache::new();
    let result = cache.refresh(&key("Customer"));
    assert!(matches!(result, Err(ViewError::UnknownKey(k)) if k == key("Customer")));
  }

  #[tokio::test]
  async fn test_refresh_runs_stored_handle() {
    let mut cache = FilteredViewCache::new();
    let h = ViewHandle::new(|| async { Ok(vec![account("002", "Customer")]) });
    cache.record_fetch(key("Customer"), ids(&["001"]), h.clone());

    let records = cache.refresh(&key("Customer")).unwrap().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(h.data().map(|d| d.len()), Some(1));
    // Identifier set is only replaced once the refresh is applied.
    assert_eq!(cache.ids(&key("Customer")), Some(ids(&["001"]).as_slice()));
  }

  #[test]
  fn test_apply_refresh_rerecords_ids_and_keeps_handle() {
    let mut cache = FilteredViewCache::new();
    let h = handle();
    cache.record_fetch(key("Customer"), ids(&["001"]), h.clone());

    let outcome = RefreshOutcome {
      key: key("Customer"),
      result: Ok(vec![account("002", "Customer")]),
    };
    assert!(cache.apply_refresh(&outcome));
    assert_eq!(cache.ids(&key("Customer")), Some(ids(&["002"]).as_slice()));
    assert!(cache.handle(&key("Customer")).unwrap().ptr_eq(&h));
  }

  #[test]
  fn test_apply_failed_or_evicted_refresh_is_noop() {
    let mut cache = FilteredViewCache::new();
    cache.record_fetch(key("Customer"), ids(&["001"]), handle());

    let failed = RefreshOutcome {
      key: key("Customer"),
      result: Err(ViewError::Fetch("offline".to_string())),
    };
    assert!(!cache.apply_refresh(&failed));
    assert_eq!(cache.ids(&key("Customer")), Some(ids(&["001"]).as_slice()));

    let gone = RefreshOutcome {
      key: key("Partner"),
      result: Ok(vec![account("003", "Partner")]),
    };
    assert!(!cache.apply_refresh(&gone));
    assert!(!cache.contains(&key("Partner")));
  }

  #[test]
  fn test_capacity_evicts_least_recently_used() {
    let mut cache = FilteredViewCache::with_capacity(NonZeroUsize::new(2).unwrap());
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());
    cache.record_fetch(key("Partner"), ids(&["b"]), handle());
    cache.touch(&key("Customer"));

    let evicted = cache.record_fetch(key("Prospect"), ids(&["c"]), handle());

    assert_eq!(evicted, Some(key("Partner")));
    assert_eq!(cache.len(), 2);
    assert!(cache.ids(&key("Partner")).is_none());
    assert!(cache.handle(&key("Partner")).is_none());
    assert!(cache.keys_containing_any(&id_set(&["b"])).is_empty());
  }

  #[test]
  fn test_rerecording_existing_key_does_not_evict() {
    let mut cache = FilteredViewCache::with_capacity(NonZeroUsize::new(1).unwrap());
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());

    assert_eq!(cache.record_fetch(key("Customer"), ids(&["b"]), handle()), None);
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_pinned_key_is_never_evicted() {
    let mut cache = FilteredViewCache::with_capacity(NonZeroUsize::new(1).unwrap());
    cache.record_fetch(FilterKey::all(), ids(&["a"]), handle());
    cache.pin(FilterKey::all());

    // A background fetch for another filter lands while the pinned view is shown
    let evicted = cache.record_fetch(key("Customer"), ids(&["b"]), handle());

    assert_eq!(evicted, None);
    assert!(cache.contains(&FilterKey::all()));
    assert!(cache.contains(&key("Customer")));
    assert_eq!(cache.keys_containing_any(&id_set(&["a"])), vec![FilterKey::all()]);
  }

  #[test]
  fn test_moving_pin_shrinks_to_capacity() {
    let mut cache = FilteredViewCache::with_capacity(NonZeroUsize::new(1).unwrap());
    cache.record_fetch(FilterKey::all(), ids(&["a"]), handle());
    cache.pin(FilterKey::all());
    cache.record_fetch(key("Customer"), ids(&["b"]), handle());

    let evicted = cache.pin(key("Customer"));

    assert_eq!(evicted, vec![FilterKey::all()]);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&key("Customer")));
  }

  #[test]
  fn test_pin_skipped_when_choosing_lru() {
    let mut cache = FilteredViewCache::with_capacity(NonZeroUsize::new(2).unwrap());
    cache.record_fetch(key("Customer"), ids(&["a"]), handle());
    cache.record_fetch(key("Partner"), ids(&["b"]), handle());
    cache.pin(key("Customer"));

    let evicted = cache.record_fetch(key("Prospect"), ids(&["c"]), handle());

    assert_eq!(evicted, Some(key("Partner")));
    assert!(cache.contains(&key("Customer")));
  }
}
