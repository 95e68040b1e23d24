use crate::core::css::{build_family_value, is_injected_family, split_families, Declaration, InlineStyle};
use crate::core::dom::{DocumentError, DocumentHost, NodeId};

/// Set on every element that received the font declaration.
pub const PROCESSED_ATTRIBUTE: &str = "data-fontara-processed";

/// Tags that never render text of their own.
pub const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "meta", "link", "head", "title", "base", "template", "svg",
    "path", "canvas", "iframe", "object", "embed", "br",
];

/// Classes icon libraries put on their glyph elements.
pub const ICON_CLASSES: &[&str] = &[
    "fa",
    "fas",
    "far",
    "fab",
    "fal",
    "fad",
    "fa-icon",
    "material-icons",
    "material-icons-outlined",
    "material-icons-round",
    "material-icons-sharp",
    "material-symbols-outlined",
    "glyphicon",
    "icon",
    "icons",
    "bi",
];

/// Lower-case fragments of icon font family names.
pub const ICON_FONT_MARKERS: &[&str] = &["fontawesome", "font awesome", "material", "icon", "glyphicon"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible { font_family: String },
    NotAnElement,
    ExcludedTag,
    IconClass,
    IconFont,
    AlreadyProcessed,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// Decides which elements get the font declaration and writes it.
#[derive(Debug, Clone)]
pub struct ElementClassifier {
    font_variable: String,
}

impl ElementClassifier {
    pub fn new(font_variable: impl Into<String>) -> Self {
        Self {
            font_variable: font_variable.into(),
        }
    }

    pub fn font_variable(&self) -> &str {
        &self.font_variable
    }

    /// Cheap checks run first; the computed style is only read once tag and
    /// class rules have passed.
    pub fn classify<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        node: NodeId,
    ) -> Result<Eligibility, DocumentError> {
        let Some(tag) = host.tag_name(node) else {
            return Ok(Eligibility::NotAnElement);
        };
        if EXCLUDED_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
            return Ok(Eligibility::ExcludedTag);
        }
        if host
            .class_list(node)
            .iter()
            .any(|class| ICON_CLASSES.contains(&class.as_str()))
        {
            return Ok(Eligibility::IconClass);
        }
        if host.has_attribute(node, PROCESSED_ATTRIBUTE) {
            return Ok(Eligibility::AlreadyProcessed);
        }

        let font_family = host.computed_font_family(node)?;
        let lowered = font_family.to_lowercase();
        if ICON_FONT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Ok(Eligibility::IconFont);
        }
        Ok(Eligibility::Eligible { font_family })
    }

    /// Writes the font declaration ahead of the element's existing inline
    /// declarations, using its current computed family list as fallback.
    pub fn restyle<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        node: NodeId,
    ) -> Result<(), DocumentError> {
        let font_family = host.computed_font_family(node)?;
        self.apply(host, node, &font_family)
    }

    fn apply<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        node: NodeId,
        font_family: &str,
    ) -> Result<(), DocumentError> {
        let fallbacks: Vec<String> = split_families(font_family)
            .into_iter()
            .filter(|family| !is_injected_family(family, &self.font_variable))
            .collect();
        let value = build_family_value(&self.font_variable, &fallbacks);

        let mut style = host
            .attribute(node, "style")
            .map(|text| InlineStyle::parse(&text))
            .unwrap_or_default();
        style.remove_where(|decl| self.is_own_declaration(decl));
        style.prepend(Declaration::new("font-family", &value, true));

        host.set_attribute(node, "style", &style.css_text())?;
        host.set_attribute(node, PROCESSED_ATTRIBUTE, "")
    }

    /// Classifies and, when eligible, restyles. Failures are confined to this
    /// element; returns whether the element was restyled.
    pub fn process<H: DocumentHost + ?Sized>(&self, host: &H, node: NodeId) -> bool {
        let outcome = self.classify(host, node).and_then(|eligibility| match eligibility {
            Eligibility::Eligible { font_family } => {
                self.apply(host, node, &font_family).map(|()| true)
            }
            _ => Ok(false),
        });
        match outcome {
            Ok(restyled) => restyled,
            Err(e) => {
                tracing::trace!("skipping {:?}: {}", node, e);
                false
            }
        }
    }

    /// Removes this crate's font declaration and processed marker, dropping
    /// the `style` attribute if nothing else is left in it. Returns whether
    /// the element carried a declaration.
    pub fn strip<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        node: NodeId,
    ) -> Result<bool, DocumentError> {
        let mut stripped = false;
        if let Some(text) = host.attribute(node, "style") {
            let mut style = InlineStyle::parse(&text);
            if style.remove_where(|decl| self.is_own_declaration(decl)) > 0 {
                stripped = true;
                if style.is_empty() {
                    host.remove_attribute(node, "style")?;
                } else {
                    host.set_attribute(node, "style", &style.css_text())?;
                }
            }
        }
        if host.has_attribute(node, PROCESSED_ATTRIBUTE) {
            host.remove_attribute(node, PROCESSED_ATTRIBUTE)?;
        }
        Ok(stripped)
    }

    fn is_own_declaration(&self, decl: &Declaration) -> bool {
        decl.name == "font-family"
            && split_families(&decl.value)
                .first()
                .map(|family| is_injected_family(family, &self.font_variable))
                .unwrap_or(false)
    }
}
