//! Editor window image handoff.
//!
//! New windows cannot receive constructor arguments, so the initial image
//! is parked in the local store under `window_<id>_imageData` and removed
//! once the window closes.

use crate::error::CaptureError;
use crate::host::{WindowHost, WindowId};
use crate::storage::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;

pub fn editor_image_key(window_id: WindowId) -> String {
    format!("window_{}_imageData", window_id)
}

pub struct EditorHandoff {
    windows: Arc<dyn WindowHost>,
    local: Arc<dyn KeyValueStore>,
}

impl EditorHandoff {
    pub fn new(windows: Arc<dyn WindowHost>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { windows, local }
    }

    pub async fn open(&self, image_data: Option<String>) -> Result<WindowId, CaptureError> {
        let window_id = self.windows.open_editor_window().await?;
        if let Some(data) = image_data {
            self.local
                .set(&editor_image_key(window_id), Value::String(data))
                .await?;
            log::info!("[EDITOR] Window {} opened with image handoff", window_id);
        } else {
            log::info!("[EDITOR] Window {} opened empty", window_id);
        }
        Ok(window_id)
    }

    pub async fn image_for(&self, window_id: WindowId) -> Result<Option<String>, CaptureError> {
        Ok(self
            .local
            .get(&editor_image_key(window_id))
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub async fn release(&self, window_id: WindowId) -> Result<(), CaptureError> {
        self.local.remove(&editor_image_key(window_id)).await?;
        log::debug!("[EDITOR] Released handoff for window {}", window_id);
        Ok(())
    }
}
