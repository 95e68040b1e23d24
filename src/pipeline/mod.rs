//! The incremental restyling pipeline: a deduplicating work queue fed by an
//! initial tree walk and a mutation watcher, drained in bounded slices.

pub mod classifier;
pub mod enumerator;
pub mod queue;
pub mod scheduler;
pub mod watcher;

pub use classifier::{Eligibility, ElementClassifier, PROCESSED_ATTRIBUTE};
pub use enumerator::{EnumerationOutcome, TreeEnumerator};
pub use queue::WorkQueue;
pub use scheduler::{BatchScheduler, Debouncer, SchedulePrimitive, SliceOutcome};
pub use watcher::{MutationOutcome, MutationWatcher};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-site override picked by the matched site rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOverride {
    pub url_pattern: String,
    pub custom_css_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationState {
    pub is_page_visible: bool,
    /// Set only while a slice runs; never held across an await point.
    pub is_processing: bool,
    pub is_active: bool,
    pub selected_font: Option<String>,
    pub site_override: Option<SiteOverride>,
}

impl Default for ActivationState {
    fn default() -> Self {
        Self {
            is_page_visible: true,
            is_processing: false,
            is_active: false,
            selected_font: None,
            site_override: None,
        }
    }
}

/// Page-wide pipeline state. The controller is its only writer outside the
/// pipeline components themselves.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub queue: WorkQueue,
    pub activation: ActivationState,
    /// Bumped on every teardown so suspended work can tell it went stale.
    pub epoch: u64,
}

impl PipelineState {
    pub fn teardown(&mut self) {
        self.queue.clear();
        self.activation.is_processing = false;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

pub type SharedState = Arc<Mutex<PipelineState>>;

pub fn shared_state() -> SharedState {
    Arc::new(Mutex::new(PipelineState::default()))
}
