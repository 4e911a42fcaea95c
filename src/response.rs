use serde_json::Value;

use crate::transport::RawResponse;

/// Body of a normalized response: structured JSON when the server said so,
/// raw bytes otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum NormalizedBody {
    Json(Value),
    Raw(Vec<u8>),
}

/// Uniform result of one call. Non-2xx statuses are carried here as ordinary
/// data; interpreting them is the caller's business.
#[derive(Clone, Debug)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub content_type: String,
    pub body: NormalizedBody,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            NormalizedBody::Json(value) => Some(value),
            NormalizedBody::Raw(_) => None,
        }
    }

    /// Message for a failed call: the `error` field of a structured body if
    /// present and non-empty, else `errno(<status>)`.
    pub fn error_message(&self) -> String {
        if let NormalizedBody::Json(value) = &self.body {
            if let Some(message) = value.get("error").and_then(Value::as_str) {
                if !message.is_empty() {
                    return message.to_string();
                }
            }
        }
        format!("errno({})", self.status)
    }
}

/// Decode `application/json` bodies into structured data; anything else, or a
/// body that fails to parse, passes through raw.
pub fn normalize(raw: RawResponse) -> ResponseEnvelope {
    let body = if raw.content_type == "application/json" {
        match serde_json::from_slice(&raw.body) {
            Ok(value) => NormalizedBody::Json(value),
            Err(err) => {
                tracing::debug!("json body failed to parse, passing through raw: {}", err);
                NormalizedBody::Raw(raw.body)
            }
        }
    } else {
        NormalizedBody::Raw(raw.body)
    };

    ResponseEnvelope {
        status: raw.status,
        content_type: raw.content_type,
        body,
    }
}
