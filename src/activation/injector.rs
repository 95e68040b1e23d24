use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::dom::{DocumentError, DocumentHost};
use crate::fonts::{custom_font_faces, FontCatalog};
use crate::settings::{CustomFont, SiteMatch};

pub const FONT_STYLES_ID: &str = "fontara-font-styles";
pub const DYNAMIC_FONT_ID: &str = "fontara-dynamic-font";
pub const CUSTOM_CSS_ID: &str = "fontara-custom-css-style";
pub const CUSTOM_FONT_FACES_ID: &str = "fontara-custom-font-styles";

pub const FRAGMENT_IDS: [&str; 4] = [
    FONT_STYLES_ID,
    DYNAMIC_FONT_ID,
    CUSTOM_CSS_ID,
    CUSTOM_FONT_FACES_ID,
];

/// Manages the `<style>` fragments this crate adds to a page. Each fragment
/// is identified by its element id, so at most one copy of each exists.
pub struct StyleInjector<H: ?Sized> {
    host: Arc<H>,
    catalog: Arc<dyn FontCatalog>,
    font_variable: String,
}

impl<H: DocumentHost + ?Sized> StyleInjector<H> {
    pub fn new(host: Arc<H>, catalog: Arc<dyn FontCatalog>, font_variable: impl Into<String>) -> Self {
        Self {
            host,
            catalog,
            font_variable: font_variable.into(),
        }
    }

    pub fn is_injected(&self, marker_id: &str) -> bool {
        self.host.element_by_id(marker_id).is_some()
    }

    /// Adds the fragment unless one with this id exists. Returns whether a
    /// new element was inserted.
    pub fn inject(&self, marker_id: &str, css: &str) -> Result<bool, DocumentError> {
        if self.is_injected(marker_id) {
            return Ok(false);
        }
        self.host.append_style_element(marker_id, css)?;
        debug!("injected {}", marker_id);
        Ok(true)
    }

    /// Adds the fragment, or rewrites its text if it already exists.
    pub fn upsert(&self, marker_id: &str, css: &str) -> Result<(), DocumentError> {
        match self.host.element_by_id(marker_id) {
            Some(existing) => self.host.set_text_content(existing, css),
            None => self.host.append_style_element(marker_id, css).map(|_| ()),
        }
    }

    pub fn remove(&self, marker_id: &str) -> Result<bool, DocumentError> {
        match self.host.element_by_id(marker_id) {
            Some(existing) => {
                self.host.remove_node(existing)?;
                debug!("removed {}", marker_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every fragment; returns how many were present.
    pub fn remove_all(&self) -> Result<usize, DocumentError> {
        let mut removed = 0;
        for marker_id in FRAGMENT_IDS {
            if self.remove(marker_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Injects the catalog stylesheet and, when the matched rule asks for it,
    /// the site's custom CSS. Returns whether the site is handled by custom
    /// CSS, even if the catalog has no sheet for it. A page that already
    /// carries the catalog is left alone and reports `false`.
    pub fn inject_font_styles(&self, site: &SiteMatch) -> Result<bool, DocumentError> {
        if self.is_injected(FONT_STYLES_ID) {
            return Ok(false);
        }
        self.inject(FONT_STYLES_ID, &self.catalog.stylesheet())?;
        if !site.wants_custom_css() {
            return Ok(false);
        }
        self.inject_custom_css(site)?;
        Ok(true)
    }

    /// Adds the custom CSS fragment for the matched rule. Returns whether the
    /// catalog had a sheet for the rule's site.
    pub fn inject_custom_css(&self, site: &SiteMatch) -> Result<bool, DocumentError> {
        let Some(rule) = site.matched_rule.as_ref().filter(|rule| rule.custom_css) else {
            return Ok(false);
        };
        match self.catalog.custom_css(&rule.url) {
            Some(css) => {
                self.inject(CUSTOM_CSS_ID, &css)?;
                Ok(true)
            }
            None => {
                warn!("no custom stylesheet bundled for {}", rule.url);
                Ok(false)
            }
        }
    }

    /// Points the font variable at `font_name`. An empty name is ignored.
    pub fn update_font_variable(&self, font_name: &str) -> Result<bool, DocumentError> {
        if font_name.is_empty() {
            return Ok(false);
        }
        let css = format!(
            ":root{{{}:\"{}\";}}",
            self.font_variable,
            font_name.replace('"', "\\\"")
        );
        self.upsert(DYNAMIC_FONT_ID, &css)?;
        Ok(true)
    }

    /// Declares the user's uploaded fonts. An empty list removes any faces
    /// declared earlier.
    pub fn inject_custom_fonts(&self, fonts: &[CustomFont]) -> Result<bool, DocumentError> {
        let css = custom_font_faces(fonts);
        if css.is_empty() {
            self.remove(CUSTOM_FONT_FACES_ID)?;
            return Ok(false);
        }
        self.upsert(CUSTOM_FONT_FACES_ID, &css)?;
        Ok(true)
    }
}
