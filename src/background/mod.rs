//! Background (privileged) context. Answers capture, editor-window and
//! settings requests from pages and the popup.
//!
//! Requests that need the page itself (full-page, element, starting a
//! selection) are relayed to the attached content-script port.

mod editor;

pub use editor::{editor_image_key, EditorHandoff};

use crate::error::{lock, CaptureError};
use crate::host::{CaptureHost, WindowHost, WindowId};
use crate::protocol::{CaptureRequest, Port, Reply, RequestHandler};
use crate::settings::SettingsStore;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub struct BackgroundService {
    capture: Arc<dyn CaptureHost>,
    settings: SettingsStore,
    editor: EditorHandoff,
    page: Mutex<Option<Port>>,
}

impl BackgroundService {
    pub fn new(
        capture: Arc<dyn CaptureHost>,
        windows: Arc<dyn WindowHost>,
        sync_store: Arc<dyn KeyValueStore>,
        local_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            capture,
            settings: SettingsStore::new(sync_store),
            editor: EditorHandoff::new(windows, local_store),
            page: Mutex::new(None),
        }
    }

    /// Route page-context requests to this content-script port.
    pub fn attach_page(&self, port: Port) {
        log::info!("[CAPTURE] Content script attached ({})", port.target());
        *lock(&self.page) = Some(port);
    }

    pub fn detach_page(&self) {
        *lock(&self.page) = None;
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Host callback: a window was closed. Drops its pending image handoff.
    pub async fn on_window_removed(&self, window_id: WindowId) -> Result<(), CaptureError> {
        self.editor.release(window_id).await
    }

    /// The image parked for an editor window, if any.
    pub async fn editor_image(&self, window_id: WindowId) -> Result<Option<String>, CaptureError> {
        self.editor.image_for(window_id).await
    }

    async fn capture_visible(&self) -> Result<String, CaptureError> {
        let start = std::time::Instant::now();
        let settings = self.settings.get_settings().await?;
        let format = settings.encode_format();
        let data = self.capture.capture_visible(format).await?;
        log::info!(
            "[CAPTURE] Visible tab captured as {} in {}ms ({} bytes)",
            format.mime_type(),
            start.elapsed().as_millis(),
            data.len()
        );
        Ok(data)
    }

    async fn relay(&self, request: CaptureRequest) -> Result<Reply, CaptureError> {
        let action = request.action();
        let port = lock(&self.page).clone().ok_or_else(|| {
            CaptureError::Protocol(format!("No content script attached for {}", action))
        })?;

        let resp = port.send(request).await;
        if !resp.success {
            return Err(CaptureError::Protocol(
                resp.error.unwrap_or_else(|| format!("{} failed", action)),
            ));
        }
        Ok(match (resp.image_data, resp.window_id) {
            (Some(data), _) => Reply::Image(data),
            (None, Some(id)) => Reply::Window(id),
            (None, None) => Reply::Ack,
        })
    }
}

#[async_trait]
impl RequestHandler for BackgroundService {
    fn context(&self) -> &'static str {
        "background"
    }

    async fn handle(&self, request: CaptureRequest) -> Result<Reply, CaptureError> {
        match request {
            // The page crops; there is no native area primitive.
            CaptureRequest::ScreenCapture | CaptureRequest::AreaCapture { .. } => {
                self.capture_visible().await.map(Reply::Image)
            }
            CaptureRequest::OpenEditorWindow { image_data } => {
                self.editor.open(image_data).await.map(Reply::Window)
            }
            CaptureRequest::GetSettings => self.settings.get_settings().await.map(Reply::Settings),
            CaptureRequest::SaveSettings { settings } => self
                .settings
                .update_settings(&settings)
                .await
                .map(Reply::Settings),
            req @ (CaptureRequest::FullPageCapture
            | CaptureRequest::ElementCapture { .. }
            | CaptureRequest::StartAreaSelection) => self.relay(req).await,
        }
    }
}
