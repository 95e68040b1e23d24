//! Bundled stylesheet text: the font catalog and per-site custom CSS.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::settings::CustomFont;

/// Source of static stylesheet text.
pub trait FontCatalog: Send + Sync {
    /// `@font-face` rules for every bundled family.
    fn stylesheet(&self) -> Cow<'_, str>;

    /// Hand-written CSS for the site identified by a rule's `url`.
    fn custom_css(&self, site_url: &str) -> Option<Cow<'_, str>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticFontCatalog {
    stylesheet: String,
    custom_css: HashMap<String, String>,
}

impl StaticFontCatalog {
    pub fn new(stylesheet: impl Into<String>) -> Self {
        Self {
            stylesheet: stylesheet.into(),
            custom_css: HashMap::new(),
        }
    }

    pub fn with_custom_css(mut self, site_url: impl Into<String>, css: impl Into<String>) -> Self {
        self.custom_css.insert(site_url.into(), css.into());
        self
    }
}

impl FontCatalog for StaticFontCatalog {
    fn stylesheet(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.stylesheet)
    }

    fn custom_css(&self, site_url: &str) -> Option<Cow<'_, str>> {
        self.custom_css
            .get(site_url)
            .map(|css| Cow::Borrowed(css.as_str()))
    }
}

/// `format()` hint for an embedded font, judged from its data URL.
pub fn font_format(data: &str) -> &'static str {
    if data.contains("data:font/woff2") {
        "woff2"
    } else if data.contains("data:font/woff") {
        "woff"
    } else if data.contains("data:font/otf") {
        "opentype"
    } else {
        "truetype"
    }
}

/// `@font-face` rules for the user's uploaded fonts. Entries missing a name
/// or payload are skipped.
pub fn custom_font_faces(fonts: &[CustomFont]) -> String {
    let mut css = String::new();
    for font in fonts {
        if font.value.is_empty() || font.data.is_empty() {
            continue;
        }
        css.push_str(&format!(
            "@font-face{{font-family:\"{}\";src:url(\"{}\") format(\"{}\");font-weight:normal;font-style:normal;font-display:swap;}}\n",
            font.value,
            font.data,
            font_format(&font.data)
        ));
    }
    css
}
