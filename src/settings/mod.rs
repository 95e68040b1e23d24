//! Persisted user preferences as seen from a page: typed keys, the store
//! interface, and the decision of whether a URL is active.

pub mod oracle;
pub mod store;

pub use oracle::{ActivationOracle, RuleListOracle, SiteMatch};
pub use store::MemorySettingsStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
    #[error("Setting {key} has an unexpected shape: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The keys the engine reads. Anything else in the store is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingKey {
    SelectedFont,
    IsExtensionEnabled,
    WebsiteList,
    CustomFontList,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::SelectedFont,
        SettingKey::IsExtensionEnabled,
        SettingKey::WebsiteList,
        SettingKey::CustomFontList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::SelectedFont => "selectedFont",
            SettingKey::IsExtensionEnabled => "isExtensionEnabled",
            SettingKey::WebsiteList => "websiteList",
            SettingKey::CustomFontList => "customFontList",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChange {
    pub key: SettingKey,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One entry of `websiteList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    pub regex: String,
    #[serde(default)]
    pub url: String,
    /// Whether a hand-written stylesheet replaces per-element rewriting on
    /// this site. Any truthy JSON value enables it.
    #[serde(default, rename = "customCss", deserialize_with = "truthy")]
    pub custom_css: bool,
}

impl SiteRule {
    pub fn new(regex: &str, url: &str) -> Self {
        Self {
            regex: regex.to_string(),
            url: url.to_string(),
            custom_css: false,
        }
    }

    pub fn with_custom_css(mut self) -> Self {
        self.custom_css = true;
        self
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

/// One entry of `customFontList`: a family name and its embedded font file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomFont {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub data: String,
}

/// Read-only, watchable key-value settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: SettingKey) -> Result<Option<Value>, StoreError>;

    /// Subscribes to changes of any key.
    fn watch(&self) -> broadcast::Receiver<SettingChange>;
}

/// Reads `key` and decodes it; a missing or `null` value is `None`.
pub async fn read_setting<T, S>(store: &S, key: SettingKey) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: SettingsStore + ?Sized,
{
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.as_str(),
                source,
            }),
    }
}

/// `selectedFont`, with the empty string treated as unset.
pub async fn selected_font<S>(store: &S) -> Result<Option<String>, StoreError>
where
    S: SettingsStore + ?Sized,
{
    Ok(read_setting::<String, S>(store, SettingKey::SelectedFont)
        .await?
        .filter(|font| !font.is_empty()))
}

pub async fn website_list<S>(store: &S) -> Result<Vec<SiteRule>, StoreError>
where
    S: SettingsStore + ?Sized,
{
    Ok(read_setting(store, SettingKey::WebsiteList)
        .await?
        .unwrap_or_default())
}

pub async fn custom_font_list<S>(store: &S) -> Result<Vec<CustomFont>, StoreError>
where
    S: SettingsStore + ?Sized,
{
    Ok(read_setting(store, SettingKey::CustomFontList)
        .await?
        .unwrap_or_default())
}
