use std::sync::Arc;
use tracing::debug;

use super::{BatchScheduler, SharedState};
use crate::core::dom::{DocumentHost, NodeId, TreeWalker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationOutcome {
    NoRoot,
    Completed { visited: usize },
    /// The pipeline was torn down while the walk was suspended.
    Cancelled { visited: usize },
}

/// Walks a subtree once and queues every element in it, yielding to the
/// executor between chunks.
pub struct TreeEnumerator<H: ?Sized> {
    host: Arc<H>,
    state: SharedState,
    scheduler: Arc<BatchScheduler<H>>,
    chunk_size: usize,
}

impl<H: DocumentHost + ?Sized + 'static> TreeEnumerator<H> {
    pub fn new(
        host: Arc<H>,
        state: SharedState,
        scheduler: Arc<BatchScheduler<H>>,
        chunk_size: usize,
    ) -> Self {
        Self {
            host,
            state,
            scheduler,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn enumerate(&self, root: Option<NodeId>) -> EnumerationOutcome {
        let Some(root) = root else {
            return EnumerationOutcome::NoRoot;
        };
        let epoch = self.state.lock().epoch;
        let mut walker = TreeWalker::elements(root);
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut visited = 0;

        loop {
            let next = walker.next_node(&*self.host);
            if let Some(node) = next {
                chunk.push(node);
                if chunk.len() < self.chunk_size {
                    continue;
                }
            }

            visited += chunk.len();
            {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    debug!("tree walk abandoned after {} elements", visited - chunk.len());
                    return EnumerationOutcome::Cancelled {
                        visited: visited - chunk.len(),
                    };
                }
                state.queue.extend(chunk.drain(..));
            }

            if next.is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }

        if self.state.lock().epoch != epoch {
            return EnumerationOutcome::Cancelled { visited };
        }
        debug!("tree walk queued {} elements", visited);
        self.scheduler.schedule();
        EnumerationOutcome::Completed { visited }
    }
}
