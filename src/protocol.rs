//! JSON framing for the tutor WebSocket.
//!
//! Outbound frames: `{"type": "chat"|"essay", "content": ..., "timestamp": ISO-8601}`.
//! Inbound frames: `{"content": ..., ...}`. The backend echoes `type` and
//! `timestamp` back; anything besides `content` is carried but never read.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Which input buffer a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Essay,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Chat => write!(f, "chat"),
            MessageKind::Essay => write!(f, "essay"),
        }
    }
}

/// A message on its way to the server. Built at send time, not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    kind: MessageKind,
    content: &'a str,
    timestamp: String,
}

impl OutboundMessage {
    /// Stamp a message with the current time.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn chat(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Chat, content)
    }

    pub fn essay(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Essay, content)
    }

    /// Millisecond-precision UTC timestamp, e.g. `2024-05-01T10:00:00.000Z`.
    pub fn timestamp(&self) -> String {
        self.sent_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Serialize to the JSON text frame the server expects.
    pub fn encode(&self) -> Result<String, ChatError> {
        let frame = WireFrame {
            kind: self.kind,
            content: &self.content,
            timestamp: self.timestamp(),
        };
        serde_json::to_string(&frame).map_err(|e| ChatError::SendFailure(e.to_string()))
    }
}

/// A reply from the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMessage {
    pub content: String,
    /// Additional server fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InboundMessage {
    /// Parse a text frame. Fails with `MalformedPayload` on invalid JSON or
    /// when `content` is missing or not a string.
    pub fn decode(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(|e| ChatError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_kind_display() {
        assert_eq!(MessageKind::Chat.to_string(), "chat");
        assert_eq!(MessageKind::Essay.to_string(), "essay");
    }

    #[test]
    fn test_encode_chat_frame_shape() {
        let msg = OutboundMessage {
            kind: MessageKind::Chat,
            content: "Hello".to_string(),
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        };
        let v: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "chat");
        assert_eq!(v["content"], "Hello");
        assert_eq!(v["timestamp"], "2024-05-01T10:00:00.000Z");
        assert_eq!(v.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_encode_essay_kind() {
        let v: serde_json::Value =
            serde_json::from_str(&OutboundMessage::essay("text").encode().unwrap()).unwrap();
        assert_eq!(v["type"], "essay");
    }

    #[test]
    fn test_encode_escapes_quotes_and_newlines() {
        let raw = OutboundMessage::chat("say \"hi\"\nthen leave").encode().unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["content"], "say \"hi\"\nthen leave");
    }

    #[test]
    fn test_timestamp_is_utc_millis() {
        let ts = OutboundMessage::chat("x").timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-05-01T10:00:00.000Z".len());
    }

    #[test]
    fn test_decode_content_only() {
        let msg = InboundMessage::decode(r#"{"content":"Hi there"}"#).unwrap();
        assert_eq!(msg.content, "Hi there");
        assert!(msg.extra.is_empty());
    }

    #[test]
    fn test_decode_keeps_extra_fields() {
        let msg = InboundMessage::decode(
            r#"{"type":"chat","content":"Hi","timestamp":"2024-05-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.content, "Hi");
        assert_eq!(msg.extra["type"], "chat");
        assert!(msg.extra.contains_key("timestamp"));
    }

    #[test]
    fn test_decode_empty_content_allowed() {
        let msg = InboundMessage::decode(r#"{"content":""}"#).unwrap();
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_decode_invalid_json_is_malformed() {
        let err = InboundMessage::decode("not json").unwrap_err();
        assert!(matches!(err, ChatError::MalformedPayload(_)));
    }

    #[test]
    fn test_decode_missing_content_is_malformed() {
        let err = InboundMessage::decode(r#"{"type":"chat"}"#).unwrap_err();
        assert!(matches!(err, ChatError::MalformedPayload(_)));
    }

    #[test]
    fn test_decode_non_string_content_is_malformed() {
        let err = InboundMessage::decode(r#"{"content":42}"#).unwrap_err();
        assert!(matches!(err, ChatError::MalformedPayload(_)));
    }
}
