//! The response envelope returned by every Tripwire endpoint.

use serde::{Deserialize, Serialize};

use super::Pagination;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Envelope for every API response.
///
/// Successful responses carry `data`; failures carry `message`. `origin`
/// names the deployment that produced the response, and list responses
/// attach a [`Pagination`] block with the total hit count filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    /// 200 with a payload.
    pub fn ok(origin: impl Into<String>, data: T) -> Self {
        Self {
            status_code: STATUS_OK,
            data: Some(data),
            message: None,
            origin: origin.into(),
            pagination: None,
        }
    }

    /// 201 with the created record.
    pub fn created(origin: impl Into<String>, data: T) -> Self {
        Self {
            status_code: STATUS_CREATED,
            data: Some(data),
            message: None,
            origin: origin.into(),
            pagination: None,
        }
    }

    /// Failure with an explicit status code and message.
    pub fn error(origin: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            data: None,
            message: Some(message.into()),
            origin: origin.into(),
            pagination: None,
        }
    }

    /// Attach a pagination block (list responses).
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// True when the envelope carries an error message rather than data.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_message() {
        let resp = ApiResponse::ok("tripwire-test", serde_json::json!({"a": 1}));
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire["statusCode"], 200);
        assert_eq!(wire["origin"], "tripwire-test");
        assert!(wire.get("message").is_none());
        assert!(wire.get("pagination").is_none());
    }

    #[test]
    fn error_envelope_omits_data() {
        let resp: ApiResponse<serde_json::Value> =
            ApiResponse::error("tripwire-test", STATUS_NOT_FOUND, "no such id");
        assert!(resp.is_error());
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire["statusCode"], 404);
        assert_eq!(wire["message"], "no such id");
        assert!(wire.get("data").is_none());
    }
}
