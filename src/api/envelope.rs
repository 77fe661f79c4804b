use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::error::ApiError;

/// How an endpoint shapes its success body. Each endpoint declares exactly
/// one; a body of the other shape is a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `{ "success"?: bool, "message"?: string, "data": T }`
    Enveloped,
    /// `T` as-is.
    Bare,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

/// Body of action endpoints that answer with a status and no payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Ack {
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 1;
        }
        (self.total_count.div_ceil(self.page_size as u64)).max(1) as u32
    }
}

pub fn decode<T: DeserializeOwned>(shape: Shape, body: &[u8]) -> Result<T, ApiError> {
    match shape {
        Shape::Bare => serde_json::from_slice(body)
            .map_err(|e| ApiError::Malformed(format!("expected bare payload: {e}"))),
        Shape::Enveloped => {
            // Status first: a rejection may carry `data: null` whatever T is.
            let status: Ack = serde_json::from_slice(body)
                .map_err(|e| ApiError::Malformed(format!("expected enveloped payload: {e}")))?;
            if !status.is_success() {
                return Err(ApiError::Rejected {
                    message: status
                        .message
                        .unwrap_or_else(|| "the server rejected the request".to_string()),
                });
            }
            let envelope: Envelope<T> = serde_json::from_slice(body)
                .map_err(|e| ApiError::Malformed(format!("expected enveloped payload: {e}")))?;
            Ok(envelope.data)
        }
    }
}

/// Action bodies may be empty (204) or an `Ack`.
pub fn decode_ack(body: &[u8]) -> Result<Ack, ApiError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Ack::default());
    }
    let ack: Ack = serde_json::from_slice(body)
        .map_err(|e| ApiError::Malformed(format!("expected acknowledgement: {e}")))?;
    if !ack.is_success() {
        return Err(ApiError::Rejected {
            message: ack
                .message
                .unwrap_or_else(|| "the server rejected the request".to_string()),
        });
    }
    Ok(ack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_enveloped_payload_unwraps_data() {
        let body = br#"{"success":true,"data":[{"id":1},{"id":2}]}"#;
        let items: Vec<Item> = decode(Shape::Enveloped, body).unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn test_shape_mismatch_is_malformed() {
        let bare = br#"[{"id":1}]"#;
        let err = decode::<Vec<Item>>(Shape::Enveloped, bare).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));

        let enveloped = br#"{"data":[{"id":1}]}"#;
        let err = decode::<Vec<Item>>(Shape::Bare, enveloped).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_unsuccessful_envelope_is_rejected() {
        let body = br#"{"success":false,"message":"Plan limit reached","data":null}"#;
        let err = decode::<Item>(Shape::Enveloped, body).unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                message: "Plan limit reached".into()
            }
        );
    }

    #[test]
    fn test_ack_accepts_empty_body() {
        assert_eq!(decode_ack(b"").unwrap(), Ack::default());
        assert!(decode_ack(br#"{"success":true,"message":"sent"}"#).unwrap().is_success());
        assert!(matches!(
            decode_ack(br#"{"success":false}"#),
            Err(ApiError::Rejected { .. })
        ));
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<Item> = Page {
            items: vec![],
            total_count: 41,
            page: 1,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
