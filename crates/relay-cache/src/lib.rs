//! # relay-cache
//!
//! Process-local memoization with bounded time-to-live.
//!
//! The cache is an explicit, injected collaborator: callers build a
//! [`CacheKey`] from an operation name and its arguments, and read through
//! [`TtlCache::get_or_try_insert_with`]. A miss is always resolvable by
//! recomputation; nothing is persisted across restarts.

mod key;
mod store;
mod sweeper;

pub use key::{CacheKey, CacheKeyBuilder};
pub use store::{CacheStats, TtlCache};
pub use sweeper::spawn_sweeper;
