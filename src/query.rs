//! Live view handles for fetched data.
//!
//! A `ViewHandle<T>` owns the fetcher that produced a filtered view and the
//! current state of that view. It can be told to re-run the fetcher with its
//! original parameters; the result replaces the state in place and every
//! observer obtained from `subscribe()` is notified.
//!
//! # Example
//!
//! ```ignore
//! let service = backend.clone();
//! let key = FilterKey::from_label("Customer");
//! let handle = ViewHandle::new(move || {
//!     let service = service.clone();
//!     let key = key.clone();
//!     async move { service.query_accounts(&key).await.map_err(|e| e.to_string()) }
//! });
//!
//! let mut observer = handle.subscribe();
//! let accounts = handle.refetch().await?;
//!
//! // Elsewhere, wake up when the view changes
//! observer.changed().await?;
//! match &*observer.borrow() {
//!     QueryState::Loading { .. } => render_spinner(),
//!     QueryState::Success(data) => render_grid(data),
//!     QueryState::Error { message, .. } => render_error(message),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::RefetchError;

/// The state of a view
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Nothing fetched yet
  Idle,
  /// A fetch is in flight; the last successful data stays visible
  Loading { previous: Option<T> },
  /// Last fetch completed successfully
  Success(T),
  /// Last fetch failed; the last successful data stays visible
  Error { message: String, previous: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading { .. })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  /// Data of the last successful fetch, even while reloading or after a
  /// failed reload
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Loading { previous } | QueryState::Error { previous, .. } => previous.as_ref(),
      QueryState::Idle => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error { message, .. } => Some(message),
      _ => None,
    }
  }

  /// Consume the state, keeping only the last successful data
  fn into_data(self) -> Option<T> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Loading { previous } | QueryState::Error { previous, .. } => previous,
      QueryState::Idle => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;

struct Inner<T> {
  fetcher: FetcherFn<T>,
  state: watch::Sender<QueryState<T>>,
  /// Bumped by every `refetch`; only the latest one may publish
  generation: AtomicU64,
}

impl<T> Inner<T> {
  fn is_current(&self, generation: u64) -> bool {
    self.generation.load(Ordering::SeqCst) == generation
  }

  /// Replace the state, carrying the last successful data forward
  fn publish(&self, next: impl FnOnce(Option<T>) -> QueryState<T>) {
    self.state.send_modify(|state| {
      let previous = std::mem::replace(state, QueryState::Idle).into_data();
      *state = next(previous);
    });
  }
}

/// Shared handle to one fetched view.
///
/// Cloning the handle is cheap and every clone refers to the same state, so
/// the cache, the UI and in-flight refresh tasks all observe one view.
pub struct ViewHandle<T> {
  inner: Arc<Inner<T>>,
}

impl<T> Clone for ViewHandle<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: Clone + Send + Sync + 'static> ViewHandle<T> {
  /// Create a handle around a fetcher. Nothing is fetched until
  /// `refetch()` is awaited.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let (state, _) = watch::channel(QueryState::Idle);
    Self {
      inner: Arc::new(Inner {
        fetcher: Arc::new(move || Box::pin(fetcher())),
        state,
        generation: AtomicU64::new(0),
      }),
    }
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> QueryState<T> {
    self.inner.state.borrow().clone()
  }

  /// Data from the last successful fetch, if the view has ever held any.
  pub fn data(&self) -> Option<T> {
    self.inner.state.borrow().data().cloned()
  }

  /// Register an observer that is notified on every state change.
  pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
    self.inner.state.subscribe()
  }

  /// Number of live observers
  #[cfg(test)]
  pub fn observer_count(&self) -> usize {
    self.inner.state.receiver_count()
  }

  /// Whether two handles refer to the same view
  #[cfg(test)]
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Re-run the original fetch and update the view in place.
  ///
  /// The returned future owns a clone of the handle, so it can be spawned or
  /// joined with refreshes of other views. Calling `refetch` again before it
  /// finishes supersedes it: the earlier future then leaves the state alone
  /// and resolves to `RefetchError::Superseded`, whichever answers first.
  pub fn refetch(&self) -> impl Future<Output = Result<T, RefetchError>> + Send + 'static {
    let inner = Arc::clone(&self.inner);
    let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

    async move {
      if !inner.is_current(generation) {
        return Err(RefetchError::Superseded);
      }
      inner.publish(|previous| QueryState::Loading { previous });

      let result = (inner.fetcher)().await;
      if !inner.is_current(generation) {
        return Err(RefetchError::Superseded);
      }

      match result {
        Ok(data) => {
          inner.publish(|_| QueryState::Success(data.clone()));
          Ok(data)
        }
        Err(message) => {
          inner.publish(|previous| QueryState::Error {
            message: message.clone(),
            previous,
          });
          Err(RefetchError::Failed(message))
        }
      }
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ViewHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ViewHandle")
      .field("state", &*self.inner.state.borrow())
      .field("generation", &self.inner.generation.load(Ordering::SeqCst))
      .field("observers", &self.inner.state.receiver_count())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  #[tokio::test]
  async fn test_refetch_success() {
    let handle = ViewHandle::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(handle.state(), QueryState::Idle));

    let data = handle.refetch().await;
    assert_eq!(data, Ok(vec![1, 2, 3]));
    assert!(handle.state().is_success());
    assert_eq!(handle.data(), Some(vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_refetch_error() {
    let handle: ViewHandle<i32> = ViewHandle::new(|| async { Err("Something went wrong".to_string()) });

    let result = handle.refetch().await;
    assert!(result.is_err());
    assert!(handle.state().is_error());
    assert_eq!(handle.state().error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_refetch_reruns_original_fetcher() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let handle = ViewHandle::new(move || {
      let counter = counter_clone.clone();
      async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
    });

    handle.refetch().await.unwrap();
    handle.refetch().await.unwrap();
    assert_eq!(handle.data(), Some(1));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_observers_see_in_place_update() {
    let handle = ViewHandle::new(|| async { Ok::<_, String>("fresh") });
    let clone = handle.clone();
    let mut observer = handle.subscribe();
    assert_eq!(handle.observer_count(), 1);

    clone.refetch().await.unwrap();

    assert!(observer.has_changed().unwrap());
    assert_eq!(observer.borrow_and_update().data(), Some(&"fresh"));
    assert!(handle.ptr_eq(&clone));
  }

  #[tokio::test]
  async fn test_loading_while_in_flight() {
    let handle = ViewHandle::new(|| async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok::<_, String>(42)
    });

    let task = tokio::spawn(handle.refetch());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handle.state().is_loading());

    task.await.unwrap().unwrap();
    assert_eq!(handle.data(), Some(42));
  }

  #[tokio::test]
  async fn test_failed_refetch_keeps_last_good_data() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let handle = ViewHandle::new(move || {
      let calls = calls_clone.clone();
      async move {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
          Ok(vec!["a"])
        } else {
          Err("offline".to_string())
        }
      }
    });

    handle.refetch().await.unwrap();
    let result = handle.refetch().await;

    assert_eq!(result, Err(RefetchError::Failed("offline".to_string())));
    assert!(handle.state().is_error());
    assert_eq!(handle.state().error(), Some("offline"));
    assert_eq!(handle.data(), Some(vec!["a"]));
  }

  #[tokio::test]
  async fn test_reload_keeps_data_visible() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let handle = ViewHandle::new(move || {
      let calls = calls_clone.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n > 0 {
          tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok::<_, String>(n)
      }
    });
    handle.refetch().await.unwrap();

    let task = tokio::spawn(handle.refetch());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handle.state().is_loading());
    assert_eq!(handle.data(), Some(0));

    task.await.unwrap().unwrap();
    assert_eq!(handle.data(), Some(1));
  }

  #[tokio::test]
  async fn test_later_refetch_wins_over_slower_earlier_one() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let handle = ViewHandle::new(move || {
      let calls = calls_clone.clone();
      async move {
        // First call answers slowly with stale data, second answers fast
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
          tokio::time::sleep(Duration::from_millis(100)).await;
          Ok::<_, String>("old")
        } else {
          tokio::time::sleep(Duration::from_millis(10)).await;
          Ok("new")
        }
      }
    });

    let first = tokio::spawn(handle.refetch());
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = tokio::spawn(handle.refetch());

    assert_eq!(second.await.unwrap(), Ok("new"));
    assert_eq!(first.await.unwrap(), Err(RefetchError::Superseded));
    assert_eq!(handle.data(), Some("new"));
  }
}
