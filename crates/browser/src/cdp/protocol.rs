//! CDP Protocol Types
//!
//! These are the fundamental types for CDP communication.
//! Keep them minimal - add domain-specific types only when needed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request ID - monotonically increasing
pub type RequestId = u64;

/// Target ID from Chrome
pub type TargetId = String;

/// Session ID for attached targets
pub type SessionId = String;

/// CDP Request sent to browser
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// CDP Response from browser
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponse {
    pub id: RequestId,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<CdpProtocolError>,
}

/// Error object carried inside a CDP response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpProtocolError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// CDP Event from browser (no request ID)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpEvent {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

/// Unified CDP Message (response or event)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    Response(CdpResponse),
    Event(CdpEvent),
}

/// Target Info from Target.getTargetInfo
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetInfo {
    #[serde(rename = "targetId")]
    pub target_id: TargetId,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    pub attached: bool,
}

/// Result of Target.createTarget
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTargetResult {
    #[serde(rename = "targetId")]
    pub target_id: TargetId,
}

/// Result of Target.attachToTarget
#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResult {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

/// Viewport slice of Page.getLayoutMetrics
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutViewport {
    pub client_width: u32,
    pub client_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_fields() {
        let request = CdpRequest {
            id: 7,
            method: "Browser.getVersion".into(),
            params: None,
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "id": 7, "method": "Browser.getVersion" })
        );
    }

    #[test]
    fn test_message_disambiguates_response_and_event() {
        let response: CdpMessage =
            serde_json::from_value(json!({ "id": 3, "result": { "ok": true } })).unwrap();
        assert!(matches!(response, CdpMessage::Response(r) if r.id == 3));

        let event: CdpMessage = serde_json::from_value(json!({
            "method": "Page.loadEventFired",
            "params": { "timestamp": 1.0 },
            "sessionId": "ABC"
        }))
        .unwrap();
        match event {
            CdpMessage::Event(e) => {
                assert_eq!(e.method, "Page.loadEventFired");
                assert_eq!(e.session_id.as_deref(), Some("ABC"));
            }
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn test_layout_viewport_reads_client_dimensions() {
        let viewport: LayoutViewport =
            serde_json::from_value(json!({ "clientWidth": 1920, "clientHeight": 1080, "pageX": 0, "pageY": 0 }))
                .unwrap();
        assert_eq!(viewport.client_width, 1920);
        assert_eq!(viewport.client_height, 1080);
    }
}
