pub mod declaration;
pub mod font_family;

pub use declaration::{Declaration, InlineStyle};
pub use font_family::{build_family_value, is_injected_family, split_families};

/// Initial `font-family` when neither the cascade nor an ancestor supplies one.
pub const USER_AGENT_FONT_FAMILY: &str = "serif";
