//! Content-script (page context) message handling.
//!
//! Serves requests that need the page itself (stitching the full page,
//! cropping to an element, showing the selection overlay) and talks to
//! the background through its own `Port` for the actual screenshots.

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::geometry::Rect;
use crate::host::{EncodeFormat, PageHost};
use crate::imaging;
use crate::orchestrator::AreaCaptureOrchestrator;
use crate::protocol::{CaptureRequest, Port, Reply, RequestHandler};
use crate::stitch::FullPageStitcher;
use async_trait::async_trait;
use std::sync::Arc;

pub struct PageService {
    page: Arc<dyn PageHost>,
    background: Port,
    stitcher: FullPageStitcher,
    orchestrator: Arc<AreaCaptureOrchestrator>,
}

impl PageService {
    pub fn new(
        page: Arc<dyn PageHost>,
        background: Port,
        orchestrator: Arc<AreaCaptureOrchestrator>,
        config: CaptureConfig,
    ) -> Self {
        let stitcher = FullPageStitcher::new(page.clone(), background.clone(), config);
        Self {
            page,
            background,
            stitcher,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Arc<AreaCaptureOrchestrator> {
        &self.orchestrator
    }

    /// The user's preferred encoding, falling back to PNG if the
    /// background cannot be asked.
    async fn preferred_format(&self) -> EncodeFormat {
        let resp = self.background.send(CaptureRequest::GetSettings).await;
        match resp.settings {
            Some(settings) if resp.success => settings.encode_format(),
            _ => {
                log::warn!(
                    "[CAPTURE] Could not read settings ({}), encoding as PNG",
                    resp.error.as_deref().unwrap_or("no settings in response")
                );
                EncodeFormat::Png
            }
        }
    }

    async fn capture_full_page(&self) -> Result<String, CaptureError> {
        let format = self.preferred_format().await;
        self.stitcher.capture_data_url(format).await
    }

    async fn capture_element(&self, rect: Rect) -> Result<String, CaptureError> {
        if rect.is_empty() {
            return Err(CaptureError::SelectionInvalid("element has no area".into()));
        }
        if !self.page.viewport().shows(&rect) {
            return Err(CaptureError::SelectionInvalid(
                "element is outside the viewport".into(),
            ));
        }

        let data = self
            .background
            .request_image(CaptureRequest::ScreenCapture)
            .await
            .map_err(CaptureError::Protocol)?;

        // Scroll may have moved while the screenshot was taken.
        let viewport = self.page.viewport();
        let cropped = imaging::crop_capture_to_page_rect(&data, &rect, &viewport)?;
        log::info!(
            "[CAPTURE] Element {}x{} at ({},{}) captured",
            rect.width, rect.height, rect.x, rect.y
        );
        Ok(cropped)
    }
}

#[async_trait]
impl RequestHandler for PageService {
    fn context(&self) -> &'static str {
        "page"
    }

    async fn handle(&self, request: CaptureRequest) -> Result<Reply, CaptureError> {
        match request {
            CaptureRequest::FullPageCapture => self.capture_full_page().await.map(Reply::Image),
            CaptureRequest::ElementCapture { rect } => {
                self.capture_element(rect).await.map(Reply::Image)
            }
            CaptureRequest::StartAreaSelection => {
                // A second start while a session is active is a no-op.
                self.orchestrator.show();
                Ok(Reply::Ack)
            }
            req @ (CaptureRequest::ScreenCapture
            | CaptureRequest::AreaCapture { .. }
            | CaptureRequest::OpenEditorWindow { .. }
            | CaptureRequest::GetSettings
            | CaptureRequest::SaveSettings { .. }) => Err(CaptureError::Unsupported {
                context: "page",
                action: req.action().to_string(),
            }),
        }
    }
}
