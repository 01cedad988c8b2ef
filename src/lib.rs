//! PageSnap — capture coordination core.
//!
//! Area selection, full-page stitching, and the request/response bus
//! between a page's content script and the privileged background worker.
//! Host primitives (screenshots, scrolling, windows, storage, input
//! listeners) are traits in `host` and `storage`; the embedding supplies
//! them.
//!
//! Domains:
//!   - geometry      — page ↔ viewport transforms
//!   - selection     — selection state machine
//!   - orchestrator  — input wiring + confirm/capture/crop
//!   - stitch        — full-page tiling and compositing
//!   - protocol      — typed messages + always-answer channel
//!   - background    — privileged request handler
//!   - content       — page-context request handler
//!   - settings      — user settings merge/migration

pub mod background;
pub mod config;
pub mod content;
pub mod error;
pub mod geometry;
pub mod host;
pub mod imaging;
pub mod orchestrator;
pub mod protocol;
pub mod selection;
pub mod settings;
pub mod stitch;
pub mod storage;

pub use background::BackgroundService;
pub use config::CaptureConfig;
pub use content::PageService;
pub use error::{CaptureError, HostError};
pub use orchestrator::{AreaCaptureOrchestrator, CaptureOutcome, InputEvent};
pub use protocol::{serve, CaptureRequest, CaptureResponse, Port};
pub use stitch::FullPageStitcher;

/// Initialise `env_logger` once; later calls are no-ops. Honours `RUST_LOG`.
pub fn init_logging() {
    if env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .is_ok()
    {
        log::info!("PageSnap capture core v{} starting", env!("CARGO_PKG_VERSION"));
    }
}
