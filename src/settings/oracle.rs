use async_trait::async_trait;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::sync::Arc;

use super::{read_setting, website_list, SettingKey, SettingsStore, SiteRule, StoreError};

/// Outcome of matching a page URL against the user's site rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteMatch {
    pub active: bool,
    pub matched_rule: Option<SiteRule>,
}

impl SiteMatch {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn wants_custom_css(&self) -> bool {
        self.active
            && self
                .matched_rule
                .as_ref()
                .map(|rule| rule.custom_css)
                .unwrap_or(false)
    }
}

/// Decides whether restyling applies to a URL.
#[async_trait]
pub trait ActivationOracle: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<SiteMatch, StoreError>;
}

/// Active when the extension is enabled and the first `websiteList` rule
/// whose pattern matches the URL (case-insensitively) exists.
pub struct RuleListOracle<S: ?Sized> {
    store: Arc<S>,
    compiled: DashMap<String, Option<Regex>>,
}

impl<S: SettingsStore + ?Sized> RuleListOracle<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            compiled: DashMap::new(),
        }
    }

    fn matches(&self, pattern: &str, url: &str) -> bool {
        if let Some(entry) = self.compiled.get(pattern) {
            return entry.as_ref().map(|re| re.is_match(url)).unwrap_or(false);
        }
        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("skipping site rule with invalid pattern {:?}: {}", pattern, e);
                None
            }
        };
        let matched = compiled.as_ref().map(|re| re.is_match(url)).unwrap_or(false);
        self.compiled.insert(pattern.to_string(), compiled);
        matched
    }

    pub fn find_rule<'a>(&self, rules: &'a [SiteRule], url: &str) -> Option<&'a SiteRule> {
        let url = url.trim();
        rules.iter().find(|rule| self.matches(&rule.regex, url))
    }
}

#[async_trait]
impl<S: SettingsStore + ?Sized> ActivationOracle for RuleListOracle<S> {
    async fn resolve(&self, url: &str) -> Result<SiteMatch, StoreError> {
        // A fresh profile has no flag stored yet; the extension ships enabled.
        let enabled = read_setting::<Value, S>(&*self.store, SettingKey::IsExtensionEnabled)
            .await?
            .map(|v| v.as_bool().unwrap_or(false))
            .unwrap_or(true);
        if !enabled {
            return Ok(SiteMatch::inactive());
        }

        let rules = website_list(&*self.store).await?;
        Ok(match self.find_rule(&rules, url) {
            Some(rule) => SiteMatch {
                active: true,
                matched_rule: Some(rule.clone()),
            },
            None => SiteMatch::inactive(),
        })
    }
}
