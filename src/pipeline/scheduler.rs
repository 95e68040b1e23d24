use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use super::{ElementClassifier, SharedState};
use crate::core::dom::DocumentHost;

/// How the next slice is waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePrimitive {
    /// Wait for the host's idle signal, but never longer than `timeout`.
    Idle { timeout: Duration },
    /// Fixed delay, for hosts without an idle signal.
    Timer { delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Page hidden, a slice already running, or nothing queued.
    Skipped,
    Drained {
        processed: usize,
        restyled: usize,
        detached: usize,
        remaining: usize,
    },
}

/// Drains the work queue in bounded slices, one scheduled callback at a time.
pub struct BatchScheduler<H: ?Sized> {
    host: Arc<H>,
    state: SharedState,
    classifier: ElementClassifier,
    slice_size: usize,
    primitive: SchedulePrimitive,
    idle: Notify,
    pending: Mutex<Option<AbortHandle>>,
}

impl<H: DocumentHost + ?Sized + 'static> BatchScheduler<H> {
    pub fn new(
        host: Arc<H>,
        state: SharedState,
        classifier: ElementClassifier,
        slice_size: usize,
        primitive: SchedulePrimitive,
    ) -> Self {
        Self {
            host,
            state,
            classifier,
            slice_size: slice_size.max(1),
            primitive,
            idle: Notify::new(),
            pending: Mutex::new(None),
        }
    }

    pub fn classifier(&self) -> &ElementClassifier {
        &self.classifier
    }

    /// Requests a slice soon. A request made while one is already pending is
    /// folded into it.
    pub fn schedule(self: &Arc<Self>) {
        let mut pending = self.pending.lock();
        if pending.as_ref().map(|task| !task.is_finished()).unwrap_or(false) {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime available, slice not scheduled");
            return;
        };

        let scheduler = Arc::clone(self);
        let task = runtime.spawn(async move {
            match scheduler.primitive {
                SchedulePrimitive::Idle { timeout } => {
                    if tokio::time::timeout(timeout, scheduler.idle.notified())
                        .await
                        .is_err()
                    {
                        trace!("idle wait hit its {:?} ceiling", timeout);
                    }
                }
                SchedulePrimitive::Timer { delay } => tokio::time::sleep(delay).await,
            }
            scheduler.pending.lock().take();
            scheduler.run_once();
        });
        *pending = Some(task.abort_handle());
    }

    /// Runs one slice synchronously and reschedules if work remains on a
    /// visible page.
    pub fn run_once(self: &Arc<Self>) -> SliceOutcome {
        let batch = {
            let mut state = self.state.lock();
            let activation = &state.activation;
            if !activation.is_page_visible || activation.is_processing || state.queue.is_empty() {
                return SliceOutcome::Skipped;
            }
            state.activation.is_processing = true;
            state.queue.drain_up_to(self.slice_size)
        };

        let mut restyled = 0;
        let mut detached = 0;
        for &node in &batch {
            if !self.host.is_connected(node) {
                detached += 1;
                continue;
            }
            if self.classifier.process(&*self.host, node) {
                restyled += 1;
            }
        }

        let (remaining, visible) = {
            let mut state = self.state.lock();
            state.activation.is_processing = false;
            (state.queue.len(), state.activation.is_page_visible)
        };
        trace!(
            "slice processed {} elements ({} restyled, {} detached), {} left",
            batch.len(),
            restyled,
            detached,
            remaining
        );
        if remaining > 0 && visible {
            self.schedule();
        }

        SliceOutcome::Drained {
            processed: batch.len(),
            restyled,
            detached,
            remaining,
        }
    }

    /// Wakes the pending slice. A slice that has not started waiting yet
    /// keeps the wakeup for when it does.
    pub fn notify_idle(&self) {
        if self.is_scheduled() {
            self.idle.notify_one();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Aborts the pending slice, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }
}

/// Runs an action once a quiet period has passed since the last trigger.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Mutex::new(None),
        }
    }

    /// Restarts the quiet period; only the action of the last trigger runs.
    pub fn trigger<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime available, debounced action dropped");
            return;
        };
        let quiet = self.quiet;
        let task = runtime.spawn(async move {
            tokio::time::sleep(quiet).await;
            action();
        });
        if let Some(previous) = self.pending.lock().replace(task.abort_handle()) {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }
}
