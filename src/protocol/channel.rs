//! Awaitable request/response channel between contexts.
//!
//! `serve()` spawns the receiving side for one handler and returns a
//! cloneable `Port` for senders. Only plain JSON crosses the channel, as it
//! would across a real extension boundary. The serving loop answers every
//! message exactly once: malformed input, handler errors and handler panics
//! all come back as `{success:false, error}`.

use super::types::{CaptureRequest, CaptureResponse, Reply};
use crate::error::CaptureError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// One side of the bus that answers requests.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Short context name for logs ("background", "page").
    fn context(&self) -> &'static str;

    async fn handle(&self, request: CaptureRequest) -> Result<Reply, CaptureError>;
}

struct Envelope {
    message: Value,
    reply: oneshot::Sender<Value>,
}

/// Sending half of a served channel.
#[derive(Clone)]
pub struct Port {
    target: &'static str,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Start answering requests for `handler`. Must be called from within a
/// tokio runtime. The serving task ends when every `Port` is dropped.
pub fn serve(handler: Arc<dyn RequestHandler>) -> Port {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let target = handler.context();

    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let response = answer(handler, envelope.message).await;
                let value = serde_json::to_value(&response).unwrap_or_else(|e| {
                    serde_json::json!({ "success": false, "error": format!("Response serialize failed: {}", e) })
                });
                if envelope.reply.send(value).is_err() {
                    log::debug!("[BUS] '{}' sender went away before the response", target);
                }
            });
        }
        log::debug!("[BUS] '{}' channel closed", target);
    });

    Port { target, tx }
}

/// Parse, dispatch, and flatten into a response. Never fails.
async fn answer(handler: Arc<dyn RequestHandler>, message: Value) -> CaptureResponse {
    let target = handler.context();
    let request: CaptureRequest = match serde_json::from_value(message) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("[BUS] '{}' rejected malformed request: {}", target, e);
            return CaptureResponse::failure(
                CaptureError::Protocol(format!("Malformed request: {}", e)).to_string(),
            );
        }
    };

    let action = request.action();
    let start = std::time::Instant::now();

    // Run the handler in its own task so a panic is contained and still answered.
    let task = tokio::spawn(async move { handler.handle(request).await });
    let response = match task.await {
        Ok(result) => {
            if let Err(e) = &result {
                log::warn!("[BUS] '{}' {} failed: {}", target, action, e);
            }
            CaptureResponse::from(result)
        }
        Err(join_err) => {
            log::error!("[BUS] '{}' {} handler crashed: {}", target, action, join_err);
            CaptureResponse::failure(
                CaptureError::Protocol(format!("{} handler crashed", action)).to_string(),
            )
        }
    };

    log::debug!(
        "[BUS] '{}' {} answered in {}ms (success={})",
        target,
        action,
        start.elapsed().as_millis(),
        response.success
    );
    response
}

impl Port {
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Send a typed request and wait for its single response.
    ///
    /// There is no timeout: a handler that never finishes leaves this
    /// pending. Failures of any kind come back as `success: false`.
    pub async fn send(&self, request: CaptureRequest) -> CaptureResponse {
        let message = match serde_json::to_value(&request) {
            Ok(v) => v,
            Err(e) => {
                return CaptureResponse::failure(format!("Request serialize failed: {}", e))
            }
        };
        let raw = self.send_raw(message).await;
        serde_json::from_value(raw).unwrap_or_else(|e| {
            CaptureResponse::failure(
                CaptureError::Protocol(format!("Malformed response: {}", e)).to_string(),
            )
        })
    }

    /// Send an untyped JSON message, as a foreign sender would.
    pub async fn send_raw(&self, message: Value) -> Value {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: reply_tx,
        };

        if self.tx.send(envelope).is_err() {
            return no_response(self.target, "receiver is gone");
        }

        match reply_rx.await {
            Ok(value) => value,
            Err(_) => no_response(self.target, "receiver dropped the request"),
        }
    }

    /// Convenience for requests whose success carries an image.
    pub async fn request_image(&self, request: CaptureRequest) -> Result<String, String> {
        self.send(request).await.into_image()
    }
}

fn no_response(target: &str, why: &str) -> Value {
    log::warn!("[BUS] No response from '{}': {}", target, why);
    serde_json::json!({
        "success": false,
        "error": CaptureError::Protocol(format!("No response from {}: {}", target, why)).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        fn context(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, request: CaptureRequest) -> Result<Reply, CaptureError> {
            match request {
                CaptureRequest::ScreenCapture => Ok(Reply::Image("data:image/png;base64,AA==".into())),
                CaptureRequest::GetSettings => panic!("settings exploded"),
                other => Err(CaptureError::Unsupported {
                    context: "echo",
                    action: other.action().to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn success_carries_payload() {
        let port = serve(Arc::new(Echo));
        let resp = port.send(CaptureRequest::ScreenCapture).await;
        assert!(resp.success);
        assert_eq!(resp.image_data.as_deref(), Some("data:image/png;base64,AA=="));
    }

    #[tokio::test]
    async fn handler_error_becomes_failure() {
        let port = serve(Arc::new(Echo));
        let resp = port.send(CaptureRequest::FullPageCapture).await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("fullPageCapture"));
    }

    #[tokio::test]
    async fn handler_panic_is_still_answered() {
        let port = serve(Arc::new(Echo));
        let resp = port.send(CaptureRequest::GetSettings).await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn malformed_messages_are_answered() {
        let port = serve(Arc::new(Echo));
        for msg in [json!({"action": "nope"}), json!(42), json!({"area": {}})] {
            let resp = port.send_raw(msg).await;
            assert_eq!(resp["success"], json!(false));
            assert!(resp["error"].as_str().unwrap().contains("Malformed request"));
        }
    }
}
