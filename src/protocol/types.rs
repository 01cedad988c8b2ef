//! Wire types for the page ⇄ background message bus.
//!
//! Requests are action-tagged JSON objects. Responses are always
//! `{success: bool, ...}` — no partial success.

use crate::geometry::Rect;
use crate::host::WindowId;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Area payload for `areaCapture`, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPayload {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_cursor: Option<bool>,
}

impl AreaPayload {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl From<Rect> for AreaPayload {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            include_cursor: None,
        }
    }
}

/// Every message either context can send. Closed set: adding a kind is a
/// compile error in every handler until it is dealt with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CaptureRequest {
    /// Visible viewport of the active tab.
    ScreenCapture,
    /// Visible viewport, to be cropped to `area` on the page side.
    AreaCapture { area: AreaPayload },
    /// Whole scrollable page, stitched on the page side.
    FullPageCapture,
    /// A DOM element's bounding box, in page coordinates.
    #[serde(rename_all = "camelCase")]
    ElementCapture { rect: Rect },
    /// Show the area-selection overlay in the page.
    StartAreaSelection,
    #[serde(rename_all = "camelCase")]
    OpenEditorWindow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_data: Option<String>,
    },
    GetSettings,
    SaveSettings {
        #[serde(default)]
        settings: Map<String, Value>,
    },
}

impl CaptureRequest {
    /// The wire tag, for logs and error messages.
    pub fn action(&self) -> &'static str {
        match self {
            CaptureRequest::ScreenCapture => "screenCapture",
            CaptureRequest::AreaCapture { .. } => "areaCapture",
            CaptureRequest::FullPageCapture => "fullPageCapture",
            CaptureRequest::ElementCapture { .. } => "elementCapture",
            CaptureRequest::StartAreaSelection => "startAreaSelection",
            CaptureRequest::OpenEditorWindow { .. } => "openEditorWindow",
            CaptureRequest::GetSettings => "getSettings",
            CaptureRequest::SaveSettings { .. } => "saveSettings",
        }
    }
}

/// Successful handler output, before it is flattened onto the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Image(String),
    Window(WindowId),
    Settings(Settings),
    Ack,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureResponse {
    pub fn ok(reply: Reply) -> Self {
        let mut resp = Self {
            success: true,
            ..Self::default()
        };
        match reply {
            Reply::Image(data) => resp.image_data = Some(data),
            Reply::Window(id) => resp.window_id = Some(id),
            Reply::Settings(s) => resp.settings = Some(s),
            Reply::Ack => {}
        }
        resp
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Image payload of a successful response, or the error as text.
    pub fn into_image(self) -> Result<String, String> {
        if !self.success {
            return Err(self.error.unwrap_or_else(|| "Unknown error".to_string()));
        }
        self.image_data
            .ok_or_else(|| "Response carried no image data".to_string())
    }
}

impl From<Result<Reply, crate::error::CaptureError>> for CaptureResponse {
    fn from(result: Result<Reply, crate::error::CaptureError>) -> Self {
        match result {
            Ok(reply) => CaptureResponse::ok(reply),
            Err(e) => CaptureResponse::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_action_tagged() {
        let req = CaptureRequest::AreaCapture {
            area: AreaPayload {
                x: 50.0,
                y: 80.0,
                width: 200.0,
                height: 150.0,
                include_cursor: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"action": "areaCapture", "area": {"x": 50.0, "y": 80.0, "width": 200.0, "height": 150.0}})
        );
        assert_eq!(
            serde_json::to_value(CaptureRequest::ScreenCapture).unwrap(),
            json!({"action": "screenCapture"})
        );
    }

    #[test]
    fn editor_window_payload_is_camel_case() {
        let req: CaptureRequest =
            serde_json::from_value(json!({"action": "openEditorWindow", "imageData": "data:x"}))
                .unwrap();
        assert_eq!(
            req,
            CaptureRequest::OpenEditorWindow {
                image_data: Some("data:x".into())
            }
        );
    }

    #[test]
    fn unknown_action_does_not_parse() {
        assert!(serde_json::from_value::<CaptureRequest>(json!({"action": "captureTab"})).is_err());
    }

    #[test]
    fn action_tag_matches_serialized_tag() {
        let all = [
            CaptureRequest::ScreenCapture,
            CaptureRequest::AreaCapture { area: Rect::default().into() },
            CaptureRequest::FullPageCapture,
            CaptureRequest::ElementCapture { rect: Rect::default() },
            CaptureRequest::StartAreaSelection,
            CaptureRequest::OpenEditorWindow { image_data: None },
            CaptureRequest::GetSettings,
            CaptureRequest::SaveSettings { settings: Map::new() },
        ];
        for req in all {
            let v = serde_json::to_value(&req).unwrap();
            assert_eq!(v["action"], json!(req.action()));
        }
    }

    #[test]
    fn failure_response_shape() {
        assert_eq!(
            serde_json::to_value(CaptureResponse::failure("boom")).unwrap(),
            json!({"success": false, "error": "boom"})
        );
        assert_eq!(
            CaptureResponse::failure("boom").into_image(),
            Err("boom".to_string())
        );
    }
}
