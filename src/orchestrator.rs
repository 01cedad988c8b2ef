//! Area-capture orchestrator: one per content-script injection.
//!
//! Owns the selection session, binds document input to it while the
//! overlay is visible, and runs the confirm → capture → crop sequence.
//!
//! Session state sits behind a mutex that is never held across an await.
//! Every cancel, hide or show bumps a generation counter; an in-flight
//! capture re-checks it after each suspension point and discards its
//! result if the session it started in is gone.

use crate::config::CaptureConfig;
use crate::error::{lock, CaptureError};
use crate::geometry::Rect;
use crate::host::{FrameScheduler, InputHost, PageHost};
use crate::imaging;
use crate::protocol::{CaptureRequest, Port};
use crate::selection::{ResizeHandle, Selection, SelectionState};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Document-level input forwarded by the host's capture-phase listeners.
/// Pointer coordinates are page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        /// The target is overlay chrome (e.g. the capture button).
        exempt: bool,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
    },
    KeyDown {
        key: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    Ignored,
    Started,
    Updated(Rect),
    Completed(SelectionState),
    Cancelled,
}

/// Read-only view of the session for the overlay UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub visible: bool,
    pub state: SelectionState,
    pub rect: Option<Rect>,
    pub show_warning: bool,
    /// Overlay chrome should be hidden while this is set.
    pub capturing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedArea {
    pub data_url: String,
    /// The page rectangle that was captured.
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(CapturedArea),
    /// Not sent: nothing selected, off-screen, or a capture is already running.
    Refused(String),
    /// Sent but failed. The selection is kept for a retry.
    Failed(String),
    /// The session was cancelled while the capture was in flight.
    Discarded,
}

struct Session {
    visible: bool,
    generation: u64,
    selection: Selection,
    listeners_attached: bool,
    capturing: bool,
}

impl Session {
    fn reset(&mut self) {
        self.selection.cancel_selection();
        self.capturing = false;
        self.generation += 1;
    }
}

type CancelCallback = Box<dyn Fn() + Send + Sync>;

pub struct AreaCaptureOrchestrator {
    session: Mutex<Session>,
    page: Arc<dyn PageHost>,
    input: Arc<dyn InputHost>,
    frames: Arc<dyn FrameScheduler>,
    bus: Port,
    on_cancel: Option<CancelCallback>,
}

impl AreaCaptureOrchestrator {
    pub fn new(
        page: Arc<dyn PageHost>,
        input: Arc<dyn InputHost>,
        frames: Arc<dyn FrameScheduler>,
        bus: Port,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            session: Mutex::new(Session {
                visible: false,
                generation: 0,
                selection: Selection::new(config.min_selection_size),
                listeners_attached: false,
                capturing: false,
            }),
            page,
            input,
            frames,
            bus,
            on_cancel: None,
        }
    }

    /// Called after Escape cancels the session.
    pub fn with_cancel_callback(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Box::new(callback));
        self
    }

    /// Start a fresh session. Returns false (and changes nothing) if one
    /// is already active.
    pub fn show(&self) -> bool {
        let mut s = lock(&self.session);
        if s.visible {
            log::debug!("[SELECTION] Overlay already visible, ignoring show");
            return false;
        }
        s.reset();
        s.visible = true;
        self.attach(&mut s);
        log::info!("[SELECTION] Area selection started");
        true
    }

    /// End the session. Any in-flight capture result will be discarded.
    pub fn hide(&self) {
        let mut s = lock(&self.session);
        s.reset();
        s.visible = false;
        self.detach(&mut s);
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.session).visible
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = lock(&self.session);
        SessionSnapshot {
            visible: s.visible,
            state: s.selection.state(),
            rect: s.selection.rect(),
            show_warning: s.selection.show_warning(),
            capturing: s.capturing,
        }
    }

    /// Dispatch one input event. Ignored while the overlay is hidden.
    pub fn handle_event(&self, event: InputEvent) -> EventOutcome {
        let outcome = {
            let mut s = lock(&self.session);
            if !s.visible {
                return EventOutcome::Ignored;
            }
            match event {
                InputEvent::KeyDown { key } if key == "Escape" => {
                    s.reset();
                    EventOutcome::Cancelled
                }
                InputEvent::KeyDown { .. } => EventOutcome::Ignored,
                InputEvent::PointerDown { exempt: true, .. } => EventOutcome::Ignored,
                InputEvent::PointerDown { x, y, .. } => match s.selection.start_selection(x, y) {
                    Ok(()) => EventOutcome::Started,
                    Err(_) => EventOutcome::Ignored,
                },
                InputEvent::PointerMove { x, y } => {
                    let viewport = self.page.viewport();
                    match s.selection.update_selection(x, y, &viewport) {
                        Ok(rect) => EventOutcome::Updated(rect),
                        Err(_) => EventOutcome::Ignored,
                    }
                }
                InputEvent::PointerUp { .. } => match s.selection.complete_selection() {
                    Ok(state) => EventOutcome::Completed(state),
                    Err(_) => EventOutcome::Ignored,
                },
            }
        };

        // Outside the lock: the callback may well call hide().
        if outcome == EventOutcome::Cancelled {
            log::info!("[SELECTION] Cancelled with Escape");
            if let Some(cb) = &self.on_cancel {
                cb();
            }
        }
        outcome
    }

    /// Drag a resize grip on a completed selection.
    pub fn resize(&self, handle: ResizeHandle, dx: f64, dy: f64) -> Option<Rect> {
        let viewport = self.page.viewport();
        let mut s = lock(&self.session);
        s.selection.resize_via_handle(handle, dx, dy, &viewport).ok()
    }

    pub fn cancel_selection(&self) {
        lock(&self.session).reset();
    }

    /// Capture the confirmed selection.
    ///
    /// Never fires on its own; the user confirms first. Waits one frame so
    /// hidden overlay chrome is gone from the screenshot, requests the
    /// viewport, and crops it using the scroll position at crop time.
    pub async fn capture_now(&self) -> CaptureOutcome {
        let (generation, rect) = match self.begin_capture() {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        self.frames.next_frame().await;
        if !self.still_current(generation) {
            return CaptureOutcome::Discarded;
        }

        let start = std::time::Instant::now();
        let response = self
            .bus
            .send(CaptureRequest::AreaCapture { area: rect.into() })
            .await;

        let mut s = lock(&self.session);
        if s.generation != generation {
            log::info!("[CAPTURE] Session ended mid-capture, discarding result");
            return CaptureOutcome::Discarded;
        }
        s.capturing = false;

        let cropped = response
            .into_image()
            .map_err(CaptureError::Protocol)
            .and_then(|data| {
                let viewport = self.page.viewport();
                imaging::crop_capture_to_page_rect(&data, &rect, &viewport)
            });

        match cropped {
            Ok(data_url) => {
                log::info!(
                    "[CAPTURE] Area {}x{} at ({},{}) captured in {}ms",
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    start.elapsed().as_millis()
                );
                // Completed-and-captured: the session goes back to Idle.
                s.reset();
                CaptureOutcome::Captured(CapturedArea { data_url, rect })
            }
            Err(e) => {
                log::warn!("[CAPTURE] Area capture failed: {}", e);
                s.selection.set_warning(true);
                CaptureOutcome::Failed(e.to_string())
            }
        }
    }

    /// Validate and mark the session as capturing.
    fn begin_capture(&self) -> Result<(u64, Rect), CaptureOutcome> {
        let viewport = self.page.viewport();
        let mut s = lock(&self.session);

        if s.capturing {
            return Err(CaptureOutcome::Refused("capture already in progress".into()));
        }

        let rect = match s.selection.completed_rect() {
            Some(r) => r.with_min_size(s.selection.min_size()),
            None => {
                s.selection.set_warning(true);
                let err = CaptureError::SelectionInvalid("nothing selected".into());
                return Err(CaptureOutcome::Refused(err.to_string()));
            }
        };

        if !viewport.shows(&rect) {
            s.selection.set_warning(true);
            let err = CaptureError::SelectionInvalid("selection is outside the viewport".into());
            log::info!("[CAPTURE] {}", err);
            return Err(CaptureOutcome::Refused(err.to_string()));
        }

        s.selection.set_warning(false);
        s.capturing = true;
        Ok((s.generation, rect))
    }

    fn still_current(&self, generation: u64) -> bool {
        let current = lock(&self.session).generation == generation;
        if !current {
            log::info!("[CAPTURE] Session ended before capture was sent");
        }
        current
    }

    // Attach/detach are idempotent on the session's own flag.
    fn attach(&self, s: &mut Session) {
        if s.listeners_attached {
            return;
        }
        self.input.attach_listeners();
        self.input.set_text_selection_enabled(false);
        s.listeners_attached = true;
    }

    fn detach(&self, s: &mut Session) {
        if !s.listeners_attached {
            return;
        }
        self.input.detach_listeners();
        self.input.set_text_selection_enabled(true);
        s.listeners_attached = false;
    }
}

impl Drop for AreaCaptureOrchestrator {
    fn drop(&mut self) {
        let mut s = lock(&self.session);
        self.detach(&mut s);
    }
}
