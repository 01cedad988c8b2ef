//! Host platform seams.
//!
//! The capture core never talks to a browser directly. Each privileged or
//! page-level primitive it needs is a trait here, implemented by whatever
//! embeds the core (an extension binding, a webview shell, test doubles).

use crate::error::HostError;
use crate::geometry::Viewport;
use async_trait::async_trait;

/// Image encoding requested from the host screenshot primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    /// JPEG with a 0–100 quality.
    Jpeg(u8),
}

impl EncodeFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodeFormat::Png => "image/png",
            EncodeFormat::Jpeg(_) => "image/jpeg",
        }
    }
}

/// The privileged screenshot primitive (background context).
///
/// Returns an encoded-image data URL of the visible viewport of the active
/// tab. The host rate-limits this globally; exceeding the limit must come
/// back as `HostError::RateLimited`, never a panic.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    async fn capture_visible(&self, format: EncodeFormat) -> Result<String, HostError>;
}

pub type WindowId = u32;

/// Creates the dedicated editor surface (background context).
#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn open_editor_window(&self) -> Result<WindowId, HostError>;
}

/// Scroll and layout access for the page a content script is injected into.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Current scroll offsets and visible size.
    fn viewport(&self) -> Viewport;

    /// Full scrollable document size in CSS pixels.
    fn page_size(&self) -> (f64, f64);

    async fn scroll_to(&self, x: f64, y: f64);
}

/// Waits for the page to paint at least one more frame.
#[async_trait]
pub trait FrameScheduler: Send + Sync {
    async fn next_frame(&self);
}

/// Document-level input listener registration.
///
/// `attach` registers capture-phase `pointerdown`/`pointermove`/`pointerup`/
/// `keydown` listeners that forward into the orchestrator.
pub trait InputHost: Send + Sync {
    fn attach_listeners(&self);
    fn detach_listeners(&self);
    fn set_text_selection_enabled(&self, enabled: bool);
}

/// Frame scheduler for hosts without a render loop: yields to the runtime once.
pub struct YieldFrame;

#[async_trait]
impl FrameScheduler for YieldFrame {
    async fn next_frame(&self) {
        tokio::task::yield_now().await;
    }
}
