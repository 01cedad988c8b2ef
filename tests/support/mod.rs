//! Shared test doubles for integration tests.
//!
//! `FakeTab` plays both the browser tab (scrolling, layout) and the
//! privileged screenshot primitive: a capture renders the part of a
//! synthetic page image that is currently scrolled into view.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pagesnap_lib::background::BackgroundService;
use pagesnap_lib::config::CaptureConfig;
use pagesnap_lib::content::PageService;
use pagesnap_lib::error::{CaptureError, HostError};
use pagesnap_lib::geometry::Viewport;
use pagesnap_lib::host::{
    CaptureHost, EncodeFormat, FrameScheduler, InputHost, PageHost, WindowHost, WindowId,
};
use pagesnap_lib::imaging;
use pagesnap_lib::orchestrator::AreaCaptureOrchestrator;
use pagesnap_lib::protocol::{serve, CaptureRequest, Port, Reply, RequestHandler};
use pagesnap_lib::storage::MemoryStore;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Deterministic colour for a device pixel of the synthetic page.
pub fn page_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(x % 251) as u8, (y % 241) as u8, ((x / 251 + y / 241) % 256) as u8, 255])
}

pub struct FakeTab {
    page_width: f64,
    page_height: f64,
    viewport: Mutex<Viewport>,
    page_image: RgbaImage,
    pub scrolls: Mutex<Vec<(f64, f64)>>,
    pub captures: AtomicUsize,
    /// 1-based capture number that fails, if any.
    fail_on: Mutex<Option<(usize, HostError)>>,
    /// When set, each capture waits here before answering.
    gate: Mutex<Option<Arc<Notify>>>,
    pub capture_waiting: AtomicBool,
}

impl FakeTab {
    pub fn new(page_width: f64, page_height: f64, viewport: Viewport) -> Self {
        let ratio = viewport.device_pixel_ratio;
        let w = (page_width * ratio).round() as u32;
        let h = (page_height * ratio).round() as u32;
        Self {
            page_width,
            page_height,
            viewport: Mutex::new(viewport),
            page_image: RgbaImage::from_fn(w, h, page_pixel),
            scrolls: Mutex::new(Vec::new()),
            captures: AtomicUsize::new(0),
            fail_on: Mutex::new(None),
            gate: Mutex::new(None),
            capture_waiting: AtomicBool::new(false),
        }
    }

    pub fn fail_capture(&self, nth: usize, err: HostError) {
        *self.fail_on.lock().unwrap() = Some((nth, err));
    }

    pub fn gate_captures(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Scroll as the user would, without recording it.
    pub fn user_scroll(&self, x: f64, y: f64) {
        let mut vp = self.viewport.lock().unwrap();
        *vp = vp.scrolled_to(x, y);
    }

    pub fn scroll_log(&self) -> Vec<(f64, f64)> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn page_image(&self) -> &RgbaImage {
        &self.page_image
    }

    fn render_viewport(&self) -> DynamicImage {
        let vp = *self.viewport.lock().unwrap();
        let r = vp.device_pixel_ratio;
        let (w, h) = ((vp.width * r).round() as u32, (vp.height * r).round() as u32);
        let (ox, oy) = ((vp.scroll_x * r).round() as u32, (vp.scroll_y * r).round() as u32);
        let out = RgbaImage::from_fn(w, h, |x, y| {
            let (px, py) = (ox + x, oy + y);
            if px < self.page_image.width() && py < self.page_image.height() {
                *self.page_image.get_pixel(px, py)
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        DynamicImage::ImageRgba8(out)
    }
}

#[async_trait]
impl CaptureHost for FakeTab {
    async fn capture_visible(&self, _format: EncodeFormat) -> Result<String, HostError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.capture_waiting.store(true, Ordering::SeqCst);
            gate.notified().await;
        }

        if let Some((nth, err)) = self.fail_on.lock().unwrap().clone() {
            if nth == n {
                return Err(err);
            }
        }
        // Always PNG so pixel comparisons stay exact.
        imaging::encode_data_url(&self.render_viewport(), EncodeFormat::Png)
            .map_err(|e| HostError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PageHost for FakeTab {
    fn viewport(&self) -> Viewport {
        *self.viewport.lock().unwrap()
    }

    fn page_size(&self) -> (f64, f64) {
        (self.page_width, self.page_height)
    }

    async fn scroll_to(&self, x: f64, y: f64) {
        self.scrolls.lock().unwrap().push((x, y));
        self.user_scroll(x, y);
    }
}

#[derive(Default)]
pub struct RecordingInput {
    pub attached: AtomicUsize,
    pub detached: AtomicUsize,
    pub text_selection_enabled: AtomicBool,
}

impl InputHost for RecordingInput {
    fn attach_listeners(&self) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn detach_listeners(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }

    fn set_text_selection_enabled(&self, enabled: bool) {
        self.text_selection_enabled.store(enabled, Ordering::SeqCst);
    }
}

/// A frame that only "renders" when the test says so.
#[derive(Default)]
pub struct GatedFrame {
    pub gate: Notify,
    pub waiting: AtomicBool,
}

#[async_trait]
impl FrameScheduler for GatedFrame {
    async fn next_frame(&self) {
        self.waiting.store(true, Ordering::SeqCst);
        self.gate.notified().await;
    }
}

pub struct InstantFrame;

#[async_trait]
impl FrameScheduler for InstantFrame {
    async fn next_frame(&self) {}
}

#[derive(Default)]
pub struct FakeWindows {
    next: AtomicU32,
}

#[async_trait]
impl WindowHost for FakeWindows {
    async fn open_editor_window(&self) -> Result<WindowId, HostError> {
        Ok(100 + self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Wraps a handler and records every request it sees.
pub struct RecordingHandler {
    inner: Arc<dyn RequestHandler>,
    pub seen: Mutex<Vec<CaptureRequest>>,
}

impl RecordingHandler {
    pub fn new(inner: Arc<dyn RequestHandler>) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<CaptureRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, action: &str) -> usize {
        self.seen().iter().filter(|r| r.action() == action).count()
    }
}

#[async_trait]
impl RequestHandler for RecordingHandler {
    fn context(&self) -> &'static str {
        self.inner.context()
    }

    async fn handle(&self, request: CaptureRequest) -> Result<Reply, CaptureError> {
        self.seen.lock().unwrap().push(request.clone());
        self.inner.handle(request).await
    }
}

pub fn test_config() -> CaptureConfig {
    CaptureConfig::default().with_settle_delay(Duration::ZERO)
}

/// A fully wired background + content script around one fake tab.
pub struct Harness {
    pub tab: Arc<FakeTab>,
    pub input: Arc<RecordingInput>,
    pub sync: Arc<MemoryStore>,
    pub local: Arc<MemoryStore>,
    pub background: Arc<BackgroundService>,
    pub recorder: Arc<RecordingHandler>,
    /// What the content script and popup use to reach the background.
    pub bg_port: Port,
    /// What the background uses to reach the content script.
    pub page_port: Port,
    pub orchestrator: Arc<AreaCaptureOrchestrator>,
    pub cancels: Arc<AtomicUsize>,
}

pub fn harness(tab: FakeTab) -> Harness {
    harness_with(tab, Arc::new(InstantFrame), test_config())
}

pub fn harness_with(
    tab: FakeTab,
    frames: Arc<dyn FrameScheduler>,
    config: CaptureConfig,
) -> Harness {
    let tab = Arc::new(tab);
    let input = Arc::new(RecordingInput::default());
    let sync = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());

    let background = Arc::new(BackgroundService::new(
        tab.clone(),
        Arc::new(FakeWindows::default()),
        sync.clone(),
        local.clone(),
    ));
    let recorder = Arc::new(RecordingHandler::new(background.clone()));
    let bg_port = serve(recorder.clone());

    let cancels = Arc::new(AtomicUsize::new(0));
    let counter = cancels.clone();
    let orchestrator = Arc::new(
        AreaCaptureOrchestrator::new(tab.clone(), input.clone(), frames, bg_port.clone(), &config)
            .with_cancel_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    );

    let page = PageService::new(tab.clone(), bg_port.clone(), orchestrator.clone(), config);
    let page_port = serve(Arc::new(page));
    background.attach_page(page_port.clone());

    Harness {
        tab,
        input,
        sync,
        local,
        background,
        recorder,
        bg_port,
        page_port,
        orchestrator,
        cancels,
    }
}
