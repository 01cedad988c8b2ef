//! User settings: merged against defaults on every read.
//!
//! Precedence is `defaults ⟵ stored ⟵ updates`. The stored value may be a
//! legacy JSON-encoded string; it is parsed transparently and rewritten as
//! a native object on the next save. Unknown keys are carried through.

use crate::error::CaptureError;
use crate::host::EncodeFormat;
use crate::storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Key of the single settings entry in the synced store.
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    Gradient,
    Solid,
    Transparent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            Quality::High => 100,
            Quality::Medium => 85,
            Quality::Low => 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_save: bool,
    pub background_type: BackgroundType,
    pub theme: Theme,
    pub quality: Quality,
    pub format: ImageFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: false,
            background_type: BackgroundType::Gradient,
            theme: Theme::Light,
            quality: Quality::High,
            format: ImageFormat::Png,
        }
    }
}

impl Settings {
    /// Typed view of a merged settings object. Fields that are missing or
    /// hold values this build does not understand keep their defaults.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut s = Settings::default();
        field(map, "autoSave", &mut s.auto_save);
        field(map, "backgroundType", &mut s.background_type);
        field(map, "theme", &mut s.theme);
        field(map, "quality", &mut s.quality);
        field(map, "format", &mut s.format);
        s
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Encoding to request from the screenshot primitive.
    pub fn encode_format(&self) -> EncodeFormat {
        match self.format {
            ImageFormat::Png => EncodeFormat::Png,
            ImageFormat::Jpeg => EncodeFormat::Jpeg(self.quality.jpeg_quality()),
        }
    }
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, slot: &mut T) {
    if let Some(raw) = map.get(key) {
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(v) => *slot = v,
            Err(e) => log::warn!("[SETTINGS] Ignoring invalid {}={}: {}", key, raw, e),
        }
    }
}

/// Normalize whatever is in the store into an object.
///
/// Native objects pass through; legacy JSON strings are parsed; anything
/// else (absent, malformed, wrong type) reads as empty.
pub fn stored_object(stored: Option<&Value>) -> Map<String, Value> {
    match stored {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                log::info!("[SETTINGS] Migrating legacy string-encoded settings");
                map
            }
            _ => {
                log::warn!("[SETTINGS] Legacy settings string is not a JSON object, using defaults");
                Map::new()
            }
        },
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            log::warn!("[SETTINGS] Unexpected stored settings type: {}", other);
            Map::new()
        }
    }
}

/// Shallow merge `defaults ⟵ stored ⟵ updates`.
pub fn merge_settings(stored: Option<&Value>, updates: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Settings::default().to_map();
    merged.extend(stored_object(stored));
    merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Settings read/write over the synced key-value area.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get_settings(&self) -> Result<Settings, CaptureError> {
        let raw = self.store.get(SETTINGS_KEY).await?;
        Ok(Settings::from_map(&merge_settings(raw.as_ref(), &Map::new())))
    }

    /// Merge `updates` over what is stored and persist the whole merged
    /// object, so a partial update never drops unrelated fields.
    pub async fn update_settings(
        &self,
        updates: &Map<String, Value>,
    ) -> Result<Settings, CaptureError> {
        let raw = self.store.get(SETTINGS_KEY).await?;
        let merged = merge_settings(raw.as_ref(), updates);
        self.store
            .set(SETTINGS_KEY, Value::Object(merged.clone()))
            .await?;
        log::info!(
            "[SETTINGS] Saved {} field(s): {}",
            updates.len(),
            updates.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(Settings::from_map(&merged))
    }
}
