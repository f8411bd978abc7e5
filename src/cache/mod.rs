//! Client-side cache of filtered views and their invalidation.
//!
//! This module remembers, per filter key:
//! - which records were in the view at its last successful fetch
//! - a live handle that can re-fetch the view in place
//!
//! After a save, the resolver finds every view that held one of the mutated
//! records and refreshes exactly those views.

mod resolver;
mod traits;
mod view_cache;

#[cfg(test)]
pub use resolver::refresh_stale;
pub use resolver::{plan_refreshes, PendingRefresh, RefreshOutcome};
pub use view_cache::FilteredViewCache;
