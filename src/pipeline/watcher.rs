use ahash::AHashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::{BatchScheduler, Debouncer, SharedState, PROCESSED_ATTRIBUTE};
use crate::core::dom::{
    DocumentError, DocumentHost, MutationCallback, MutationRecord, MutationType, NodeId,
    ObserverId, ObserverOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Delivered after the subscription was torn down.
    Ignored,
    Queued {
        added: usize,
        enqueued: usize,
        /// The batch was over the threshold and only laid-out elements went in.
        throttled: bool,
    },
}

/// Keeps the work queue fed with elements the page inserts after the
/// initial walk.
pub struct MutationWatcher<H: ?Sized> {
    host: Arc<H>,
    state: SharedState,
    scheduler: Arc<BatchScheduler<H>>,
    debouncer: Debouncer,
    large_batch_threshold: usize,
    observer: Mutex<Option<ObserverId>>,
}

impl<H: DocumentHost + ?Sized + 'static> MutationWatcher<H> {
    pub fn new(
        host: Arc<H>,
        state: SharedState,
        scheduler: Arc<BatchScheduler<H>>,
        debounce: Duration,
        large_batch_threshold: usize,
    ) -> Self {
        Self {
            host,
            state,
            scheduler,
            debouncer: Debouncer::new(debounce),
            large_batch_threshold,
            observer: Mutex::new(None),
        }
    }

    /// Subscribes to child-list changes anywhere under `root`, replacing any
    /// previous subscription.
    pub fn start(self: &Arc<Self>, root: NodeId) -> Result<(), DocumentError> {
        self.stop();

        let watcher = Arc::downgrade(self);
        let callback: MutationCallback = Arc::new(move |records: &[MutationRecord]| {
            if let Some(watcher) = watcher.upgrade() {
                watcher.on_mutation(records);
            }
        });
        let id = self
            .host
            .observe(root, ObserverOptions::child_list_subtree(), callback)?;
        *self.observer.lock() = Some(id);
        debug!("watching {:?} for inserted elements", root);
        Ok(())
    }

    /// Drops the subscription and any work it produced.
    pub fn stop(&self) {
        if let Some(id) = self.observer.lock().take() {
            self.host.disconnect(id);
            debug!("mutation watcher stopped");
        }
        self.debouncer.cancel();
        self.state.lock().teardown();
    }

    pub fn is_watching(&self) -> bool {
        self.observer.lock().is_some()
    }

    pub fn on_mutation(&self, records: &[MutationRecord]) -> MutationOutcome {
        if !self.is_watching() {
            return MutationOutcome::Ignored;
        }

        let mut seen = AHashSet::new();
        let added: Vec<NodeId> = records
            .iter()
            .filter(|record| record.mutation_type == MutationType::ChildList)
            .flat_map(|record| record.added_nodes.iter().copied())
            .filter(|&node| seen.insert(node))
            .filter(|&node| {
                self.host.is_element(node) && !self.host.has_attribute(node, PROCESSED_ATTRIBUTE)
            })
            .collect();

        let throttled = added.len() > self.large_batch_threshold;
        let wanted: Vec<NodeId> = if throttled {
            let body = self.host.body();
            added
                .iter()
                .copied()
                .filter(|&node| Some(node) == body || self.host.has_layout_box(node))
                .collect()
        } else {
            added.clone()
        };
        let enqueued = wanted.len();
        self.state.lock().queue.extend(wanted);
        trace!(
            "mutation batch added {} elements, {} queued",
            added.len(),
            enqueued
        );

        let state = self.state.clone();
        let scheduler = self.scheduler.clone();
        self.debouncer.trigger(move || {
            if !state.lock().queue.is_empty() {
                scheduler.schedule();
            }
        });

        MutationOutcome::Queued {
            added: added.len(),
            enqueued,
            throttled,
        }
    }
}
