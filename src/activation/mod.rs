//! Decides, per page, whether restyling runs and in which form, and owns the
//! pipeline components while it does.

pub mod controller;
pub mod injector;

pub use controller::FontaraEngine;
pub use injector::{
    StyleInjector, CUSTOM_CSS_ID, CUSTOM_FONT_FACES_ID, DYNAMIC_FONT_ID, FONT_STYLES_ID,
    FRAGMENT_IDS,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivationMode {
    #[default]
    Inactive,
    /// A hand-written stylesheet handles the site; elements are not rewritten.
    ActiveCustomCss,
    ActiveGeneric,
}

impl ActivationMode {
    pub fn is_active(&self) -> bool {
        !matches!(self, ActivationMode::Inactive)
    }
}

impl std::fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ActivationMode::Inactive => "inactive",
            ActivationMode::ActiveCustomCss => "active (custom css)",
            ActivationMode::ActiveGeneric => "active",
        })
    }
}
