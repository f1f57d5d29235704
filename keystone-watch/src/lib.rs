//! # Keystone Watch
//!
//! The commit-watch registry: clients register interest in a path pattern
//! and a baseline revision, and are notified at most once when a commit
//! both advances past the baseline and touches a matching path.
//!
//! The registry is process-local and non-durable: watches do not survive a
//! restart, and fan-out stays within one storage instance. The storage
//! engine drives it by calling [`CommitWatchers::notify`] for every path a
//! commit changed, and [`CommitWatchers::close`] exactly once on shutdown.
//!
//! ## Concurrency
//!
//! All bucket-map mutation happens under one short mutex; futures are
//! completed only after the lock is released, so user callbacks can never
//! re-enter the registry under lock. Watch state transitions are atomic
//! compare-and-swaps, which makes cancellation race-free against delivery:
//! whichever side claims the watch first wins and the loser is a no-op.

pub mod error;
pub mod registry;
pub mod watch;

pub use error::WatchError;
pub use registry::{CommitWatchers, WatchHandle, WatchStats, DEFAULT_MAX_PATTERN_ENTRIES};
pub use watch::{WatchListener, WatchState};
