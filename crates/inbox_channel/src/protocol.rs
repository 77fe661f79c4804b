//! JSON hub protocol framing.
//!
//! Every frame is a JSON object terminated by the ASCII record separator
//! (`0x1E`); several frames may share one WebSocket text message. The
//! `type` field selects the frame kind:
//!
//! | type | frame |
//! |------|-------|
//! | 1 | Invocation |
//! | 3 | Completion |
//! | 6 | Ping |
//! | 7 | Close |
//!
//! Streaming frames (2, 4, 5) are not used by the inbox hub and decode as
//! [`HubFrame::Unsupported`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const COMPLETION: u8 = 3;
const PING: u8 = 6;
const CLOSE: u8 = 7;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame type {kind} is missing `{field}`")]
    MissingField { kind: u8, field: &'static str },
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json".into(),
            version: 1,
        }
    }
}

impl HandshakeRequest {
    pub fn encode(&self) -> String {
        // serializing two plain fields cannot fail
        let mut text = serde_json::to_string(self).unwrap_or_default();
        text.push(RECORD_SEPARATOR);
        text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HandshakeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parses the handshake answer. Anything that follows the first record
/// separator is returned so the caller can feed it to [`decode_frames`].
pub fn decode_handshake(text: &str) -> Result<&str, ProtocolError> {
    let (head, rest) = text.split_once(RECORD_SEPARATOR).unwrap_or((text, ""));
    let response: HandshakeResponse = serde_json::from_str(head)?;
    match response.error {
        Some(err) => Err(ProtocolError::HandshakeRejected(err)),
        None => Ok(rest),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubFrame {
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    Unsupported(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(rename = "type")]
    kind: u8,
    invocation_id: Option<String>,
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    result: Option<Value>,
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

impl HubFrame {
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        HubFrame::Invocation {
            invocation_id: None,
            target: target.into(),
            arguments,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            HubFrame::Invocation {
                invocation_id,
                target,
                arguments,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!(INVOCATION));
                if let Some(id) = invocation_id {
                    map.insert("invocationId".into(), json!(id));
                }
                map.insert("target".into(), json!(target));
                map.insert("arguments".into(), Value::Array(arguments.clone()));
                Value::Object(map)
            }
            HubFrame::Completion {
                invocation_id,
                result,
                error,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!(COMPLETION));
                map.insert("invocationId".into(), json!(invocation_id));
                if let Some(result) = result {
                    map.insert("result".into(), result.clone());
                }
                if let Some(error) = error {
                    map.insert("error".into(), json!(error));
                }
                Value::Object(map)
            }
            HubFrame::Ping => json!({ "type": PING }),
            HubFrame::Close {
                error,
                allow_reconnect,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!(CLOSE));
                if let Some(error) = error {
                    map.insert("error".into(), json!(error));
                }
                if *allow_reconnect {
                    map.insert("allowReconnect".into(), json!(true));
                }
                Value::Object(map)
            }
            HubFrame::Unsupported(kind) => json!({ "type": kind }),
        }
    }

    /// Serialized frame including its trailing record separator.
    pub fn encode(&self) -> String {
        let mut text = self.to_value().to_string();
        text.push(RECORD_SEPARATOR);
        text
    }

    fn from_raw(raw: RawFrame) -> Result<Self, ProtocolError> {
        match raw.kind {
            INVOCATION => Ok(HubFrame::Invocation {
                invocation_id: raw.invocation_id,
                target: raw.target.ok_or(ProtocolError::MissingField {
                    kind: INVOCATION,
                    field: "target",
                })?,
                arguments: raw.arguments,
            }),
            COMPLETION => Ok(HubFrame::Completion {
                invocation_id: raw.invocation_id.ok_or(ProtocolError::MissingField {
                    kind: COMPLETION,
                    field: "invocationId",
                })?,
                result: raw.result,
                error: raw.error,
            }),
            PING => Ok(HubFrame::Ping),
            CLOSE => Ok(HubFrame::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            }),
            other => Ok(HubFrame::Unsupported(other)),
        }
    }
}

/// Splits one transport message into frames. A bad frame does not poison
/// the ones around it.
pub fn decode_frames(text: &str) -> Vec<Result<HubFrame, ProtocolError>> {
    text.split(RECORD_SEPARATOR)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            let raw: RawFrame = serde_json::from_str(chunk)?;
            HubFrame::from_raw(raw)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_request_is_terminated() {
        let text = HandshakeRequest::default().encode();
        assert!(text.ends_with(RECORD_SEPARATOR));
        assert!(text.contains("\"protocol\":\"json\""));
        assert!(text.contains("\"version\":1"));
    }

    #[test]
    fn test_handshake_response_with_trailing_frame() {
        let text = format!("{{}}{rs}{{\"type\":6}}{rs}", rs = RECORD_SEPARATOR);
        let rest = decode_handshake(&text).unwrap();
        let frames = decode_frames(rest);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap(), &HubFrame::Ping);
    }

    #[test]
    fn test_handshake_error_is_reported() {
        let text = format!("{{\"error\":\"bad protocol\"}}{}", RECORD_SEPARATOR);
        match decode_handshake(&text) {
            Err(ProtocolError::HandshakeRejected(msg)) => assert_eq!(msg, "bad protocol"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_multiple_frames_in_one_message() {
        let batch = format!(
            "{}{}{}",
            HubFrame::invocation("ReceiveInboxMessage", vec![json!({"contactId": "1"})]).encode(),
            HubFrame::Ping.encode(),
            HubFrame::Close { error: Some("bye".into()), allow_reconnect: true }.encode(),
        );
        let frames: Vec<HubFrame> = decode_frames(&batch).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        match &frames[0] {
            HubFrame::Invocation { target, arguments, invocation_id } => {
                assert_eq!(target, "ReceiveInboxMessage");
                assert_eq!(arguments[0]["contactId"], "1");
                assert!(invocation_id.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            frames[2],
            HubFrame::Close { error: Some("bye".into()), allow_reconnect: true }
        );
    }

    #[test]
    fn test_invocation_without_target_is_rejected() {
        let text = format!("{{\"type\":1,\"arguments\":[]}}{}", RECORD_SEPARATOR);
        let frames = decode_frames(&text);
        assert!(matches!(
            frames[0],
            Err(ProtocolError::MissingField { kind: 1, field: "target" })
        ));
    }

    #[test]
    fn test_bad_frame_does_not_poison_batch() {
        let text = format!("not json{rs}{{\"type\":6}}{rs}", rs = RECORD_SEPARATOR);
        let frames = decode_frames(&text);
        assert!(frames[0].is_err());
        assert_eq!(frames[1].as_ref().unwrap(), &HubFrame::Ping);
    }

    #[test]
    fn test_completion_encoding() {
        let frame = HubFrame::Completion {
            invocation_id: "7".into(),
            result: Some(json!({"ok": true})),
            error: None,
        };
        let value = frame.to_value();
        assert_eq!(value["type"], 3);
        assert_eq!(value["invocationId"], "7");
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_streaming_frames_are_unsupported() {
        let text = format!("{{\"type\":2,\"invocationId\":\"1\",\"item\":3}}{}", RECORD_SEPARATOR);
        assert_eq!(decode_frames(&text)[0].as_ref().unwrap(), &HubFrame::Unsupported(2));
    }
}
