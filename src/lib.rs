//! Fontara page engine
//!
//! Rewrites the `font-family` of text elements on a page to the user's chosen
//! font, element by element, without ever holding the page's thread for more
//! than one bounded slice.
//!
//! Notes for the host:
//!  - Run the engine on a single-thread Tokio runtime:
//!    `#[tokio::main(flavor = "current_thread")] async fn main() { /* ... */ }`
//!  - Feed page notifications through [`crate::core::events::EventSystem`] and hand
//!    the receiver to [`FontaraEngine::run`].
//!  - The document is reached only through [`crate::core::dom::DocumentHost`]; the
//!    bundled [`crate::core::dom::Document`] is an in-memory implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod activation;
pub mod core;
pub mod fonts;
pub mod pipeline;
pub mod settings;

pub use activation::{ActivationMode, FontaraEngine, StyleInjector};
pub use crate::core::dom::{Document, DocumentError, DocumentHost, NodeId};
pub use crate::core::events::{EventSender, EventSystem, PageEvent};
pub use fonts::{FontCatalog, StaticFontCatalog};
pub use pipeline::{ActivationState, Eligibility, ElementClassifier, SchedulePrimitive};
pub use settings::{
    ActivationOracle, MemorySettingsStore, RuleListOracle, SettingChange, SettingKey,
    SettingsStore, SiteMatch, StoreError,
};

#[derive(Error, Debug)]
pub enum FontaraError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
    #[error("Settings error: {0}")]
    Settings(#[from] StoreError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FontaraError>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FontaraConfig {
    /// Elements classified per slice.
    pub slice_size: usize,
    /// Elements queued by the initial walk between yields.
    pub enumeration_chunk: usize,
    /// Mutation batches above this size only queue laid-out elements.
    pub large_batch_threshold: usize,
    pub debounce_ms: u64,
    pub idle_timeout_ms: u64,
    pub fallback_delay_ms: u64,
    /// Whether the host delivers `PageEvent::Idle`. Without it slices are
    /// paced by `fallback_delay_ms`.
    pub idle_callbacks: bool,
    pub font_variable: String,
}

impl Default for FontaraConfig {
    fn default() -> Self {
        Self {
            slice_size: 50,
            enumeration_chunk: 50,
            large_batch_threshold: 100,
            debounce_ms: 150,
            idle_timeout_ms: 100,
            fallback_delay_ms: 16,
            idle_callbacks: true,
            font_variable: "--fontara-font".to_string(),
        }
    }
}

impl FontaraConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| FontaraError::Config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slice_size == 0 {
            return Err(FontaraError::Config("slice_size must be positive".to_string()));
        }
        if self.enumeration_chunk == 0 {
            return Err(FontaraError::Config(
                "enumeration_chunk must be positive".to_string(),
            ));
        }
        if !self.font_variable.starts_with("--") {
            return Err(FontaraError::Config(format!(
                "font_variable {:?} is not a custom property name",
                self.font_variable
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn schedule_primitive(&self) -> SchedulePrimitive {
        if self.idle_callbacks {
            SchedulePrimitive::Idle {
                timeout: self.idle_timeout(),
            }
        } else {
            SchedulePrimitive::Timer {
                delay: self.fallback_delay(),
            }
        }
    }
}

/// Installs a `fmt` subscriber filtered by `filter` (an `EnvFilter`
/// directive such as `"fontara=debug"`), unless `RUST_LOG` is set. Returns
/// `false` if a global subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
