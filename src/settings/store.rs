use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::broadcast;

use super::{SettingChange, SettingKey, SettingsStore, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Settings held in memory. Hosts push updates with [`MemorySettingsStore::set`];
/// every change is broadcast to watchers.
pub struct MemorySettingsStore {
    values: RwLock<HashMap<SettingKey, Value>>,
    changes: broadcast::Sender<SettingChange>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Builds a store from a JSON object keyed by wire names
    /// (`selectedFont`, `websiteList`, ...). Unknown keys are ignored.
    pub fn from_json(document: &Value) -> Result<Self, StoreError> {
        let object = document.as_object().ok_or_else(|| {
            StoreError::Unavailable("settings document must be a JSON object".to_string())
        })?;
        let store = Self::new();
        {
            let mut values = store.values.write();
            for (name, value) in object {
                match SettingKey::from_name(name) {
                    Some(key) => {
                        values.insert(key, value.clone());
                    }
                    None => tracing::debug!("ignoring unknown setting {}", name),
                }
            }
        }
        Ok(store)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let document: Value = serde_json::from_str(&text)?;
        Self::from_json(&document)
    }

    pub fn set(&self, key: SettingKey, value: Value) {
        let old_value = self.values.write().insert(key, value.clone());
        self.publish(SettingChange {
            key,
            old_value,
            new_value: Some(value),
        });
    }

    pub fn remove(&self, key: SettingKey) -> Option<Value> {
        let old_value = self.values.write().remove(&key);
        if old_value.is_some() {
            self.publish(SettingChange {
                key,
                old_value: old_value.clone(),
                new_value: None,
            });
        }
        old_value
    }

    fn publish(&self, change: SettingChange) {
        // No subscribers is not an error; the engine may not be running yet.
        let _ = self.changes.send(change);
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: SettingKey) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().get(&key).cloned())
    }

    fn watch(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}
