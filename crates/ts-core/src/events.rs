//! Lifecycle event wire shape
//!
//! Every notification that crosses from the session backend to the UI
//! domain is a [`LifecycleEvent`]: one typed stream, tagged with the
//! session and profile it belongs to. Serialized, an event looks like
//!
//! ```json
//! {"sessionId":3,"profileId":"conn_1","kind":"error","payload":"Authentication failed"}
//! ```
//!
//! Events for one session are produced and delivered in order; no order
//! is implied between different sessions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::{ProfileId, SessionId};

/// A session state change or data chunk addressed to the UI domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    /// Session the event belongs to
    pub session_id: SessionId,
    /// Profile the session was opened for
    pub profile_id: ProfileId,
    /// What happened
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Event kind and its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    /// Handshake finished, the shell is open
    Connected,
    /// Bytes from the remote shell
    Data(Bytes),
    /// Transport failure; the message is shown to the user verbatim
    Error(String),
    /// The session is gone and its registry entry removed
    Closed,
}

impl EventPayload {
    /// Name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Connected => "connected",
            EventPayload::Data(_) => "data",
            EventPayload::Error(_) => "error",
            EventPayload::Closed => "closed",
        }
    }
}

impl LifecycleEvent {
    /// Create an event
    pub fn new(session_id: SessionId, profile_id: ProfileId, payload: EventPayload) -> Self {
        Self {
            session_id,
            profile_id,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_event_wire_shape() {
        let event = LifecycleEvent::new(
            SessionId::new(3),
            ProfileId::new("conn_1"),
            EventPayload::Error("Authentication failed".to_string()),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sessionId": 3,
                "profileId": "conn_1",
                "kind": "error",
                "payload": "Authentication failed"
            })
        );
    }

    #[test]
    fn test_unit_kinds_have_no_payload() {
        let event = LifecycleEvent::new(SessionId::new(1), ProfileId::new("p"), EventPayload::Closed);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "closed");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_data_event_parses() {
        let json = r#"{"sessionId":7,"profileId":"p","kind":"data","payload":[104,105]}"#;
        let event: LifecycleEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.session_id, SessionId::new(7));
        assert_eq!(event.payload, EventPayload::Data(Bytes::from_static(b"hi")));
        assert_eq!(event.payload.kind(), "data");
    }
}
