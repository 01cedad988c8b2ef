//! Capture request protocol: public API.
//!
//! - **types**: the action-tagged request union and `{success}` responses
//! - **channel**: `serve()` / `Port`, the awaitable always-answer bus

pub mod channel;
pub mod types;

pub use channel::{serve, Port, RequestHandler};
pub use types::{AreaPayload, CaptureRequest, CaptureResponse, Reply};
