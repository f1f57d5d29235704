//! Watch lifecycle: state machine and completion.

use keystone_core::Revision;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::WatchError;

/// Lifecycle state of a registered watch.
///
/// `Pending → Notified` happens exactly once, claimed by compare-and-swap
/// under the registry lock; `Pending → Cancelled` when the holder abandons
/// the watch first. `Removed` is terminal bookkeeping set once the registry
/// has unlinked the watch and completion (if any) has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Pending,
    Notified,
    Cancelled,
    Removed,
}

const PENDING: u8 = 0;
const NOTIFIED: u8 = 1;
const CANCELLED: u8 = 2;
const REMOVED: u8 = 3;

/// Callback-style completion for watches registered without a future.
///
/// Listeners are invoked outside the registry lock and at most once.
pub trait WatchListener: Send + Sync + 'static {
    /// Called with the first eligible revision.
    fn on_notify(&self, revision: Revision);

    /// Called when the registry shuts down before notification.
    fn on_close(&self, error: &WatchError) {
        let _ = error;
    }

    /// Whether [`WatchListener::on_close`] should run at all. Listeners
    /// that only react to successful commits return `false` and are
    /// silently dropped on close.
    fn propagates_failure(&self) -> bool {
        true
    }
}

impl<T: WatchListener + ?Sized> WatchListener for Arc<T> {
    fn on_notify(&self, revision: Revision) {
        (**self).on_notify(revision)
    }

    fn on_close(&self, error: &WatchError) {
        (**self).on_close(error)
    }

    fn propagates_failure(&self) -> bool {
        (**self).propagates_failure()
    }
}

pub(crate) type Completion = oneshot::Sender<Result<Revision, WatchError>>;

/// One registered watch. Owned by the registry bucket while pending and
/// shared with the holder's [`WatchHandle`](crate::registry::WatchHandle).
pub(crate) struct Watch {
    id: u64,
    baseline: Revision,
    state: AtomicU8,
    sender: Mutex<Option<Completion>>,
    listener: Option<Box<dyn WatchListener>>,
}

impl Watch {
    pub(crate) fn new(
        id: u64,
        baseline: Revision,
        sender: Option<Completion>,
        listener: Option<Box<dyn WatchListener>>,
    ) -> Watch {
        Watch {
            id,
            baseline,
            state: AtomicU8::new(PENDING),
            sender: Mutex::new(sender),
            listener,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn baseline(&self) -> Revision {
        self.baseline
    }

    pub(crate) fn state(&self) -> WatchState {
        match self.state.load(Ordering::Acquire) {
            PENDING => WatchState::Pending,
            NOTIFIED => WatchState::Notified,
            CANCELLED => WatchState::Cancelled,
            _ => WatchState::Removed,
        }
    }

    /// Claims the watch for delivery. Only the caller that wins this CAS
    /// may complete the watch.
    pub(crate) fn claim(&self) -> bool {
        self.state
            .compare_exchange(PENDING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks the watch cancelled by its holder. Fails if delivery already
    /// claimed it.
    pub(crate) fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Terminal bookkeeping once the watch is unlinked from its bucket.
    pub(crate) fn mark_removed(&self) {
        self.state.store(REMOVED, Ordering::Release);
    }

    /// True when nothing can observe a delivery anymore: no listener, and
    /// the holder dropped its receiver. Used to prune abandoned watches
    /// during bucket scans.
    pub(crate) fn is_abandoned(&self) -> bool {
        if self.listener.is_some() {
            return false;
        }
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.is_closed())
    }

    pub(crate) fn propagates_failure(&self) -> bool {
        match &self.listener {
            Some(listener) => listener.propagates_failure(),
            None => true,
        }
    }

    /// Completes the watch with a revision. Must only run after a
    /// successful [`Watch::claim`], outside the registry lock.
    pub(crate) fn deliver(&self, revision: Revision) {
        if let Some(sender) = self.sender.lock().take() {
            // The holder may have dropped its receiver in the meantime;
            // that race already lost to claim(), so the send result is
            // irrelevant.
            let _ = sender.send(Ok(revision));
        }
        if let Some(listener) = &self.listener {
            listener.on_notify(revision);
        }
        self.mark_removed();
    }

    /// Completes the watch with a failure. Same claim discipline as
    /// [`Watch::deliver`].
    pub(crate) fn fail(&self, error: &WatchError) {
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(Err(error.clone()));
        }
        if let Some(listener) = &self.listener {
            listener.on_close(error);
        }
        self.mark_removed();
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("id", &self.id)
            .field("baseline", &self.baseline)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
