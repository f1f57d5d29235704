//! Errors surfaced through watch registration and delivery.

use keystone_core::pattern::PatternError;
use keystone_core::Revision;
use thiserror::Error;

/// Why a watch could not be registered, or how it was terminated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WatchError {
    /// The registry was shut down; every pending watch observes this.
    #[error("watch registry closed: {0}")]
    RegistryClosed(String),

    /// The watch pattern failed to compile.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    /// Baselines must be absolute; `HEAD` is resolved by the caller before
    /// registering.
    #[error("watch baseline must be an absolute revision: {0}")]
    RelativeBaseline(Revision),

    /// The registry went away without delivering or closing.
    #[error("watch aborted before notification")]
    Aborted,
}
