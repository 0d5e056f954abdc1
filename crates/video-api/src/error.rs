use serde::Deserialize;
use thiserror::Error;

/// Remote codes that signal billing or rate limits regardless of HTTP status
const QUOTA_CODES: &[&str] = &[
    "billing_hard_limit_reached",
    "insufficient_quota",
    "rate_limit_exceeded",
];

/// Errors returned by the video endpoint or the transport underneath it.
///
/// Messages are kept verbatim so they can be shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 401, the credential was rejected
    #[error("{message}")]
    Auth {
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },

    /// 403, including the organization verification case
    #[error("{message}")]
    Permission {
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },

    /// Billing limit or 429 rate limit
    #[error("{message}")]
    Quota {
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },

    /// Malformed request
    #[error("{message}")]
    Validation {
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },

    /// 5xx
    #[error("{message}")]
    Server {
        status: Option<u16>,
        message: String,
        code: Option<String>,
    },

    /// Network or parse failure
    #[error("{message}")]
    Transport { message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Coarse classification of [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    Auth,
    Permission,
    Quota,
    Validation,
    Server,
    Transport,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation {
            status: None,
            message: msg.into(),
            code: None,
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ApiError::Transport {
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Auth { .. } => ApiErrorKind::Auth,
            ApiError::Permission { .. } => ApiErrorKind::Permission,
            ApiError::Quota { .. } => ApiErrorKind::Quota,
            ApiError::Validation { .. } => ApiErrorKind::Validation,
            ApiError::Server { .. } => ApiErrorKind::Server,
            ApiError::Transport { .. } => ApiErrorKind::Transport,
        }
    }

    /// HTTP status reported by the remote, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. }
            | ApiError::Permission { status, .. }
            | ApiError::Quota { status, .. }
            | ApiError::Validation { status, .. }
            | ApiError::Server { status, .. } => *status,
            ApiError::Transport { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Auth { message, .. }
            | ApiError::Permission { message, .. }
            | ApiError::Quota { message, .. }
            | ApiError::Validation { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Transport { message } => message,
        }
    }

    /// Remote error code from the error envelope, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Auth { code, .. }
            | ApiError::Permission { code, .. }
            | ApiError::Quota { code, .. }
            | ApiError::Validation { code, .. }
            | ApiError::Server { code, .. } => code.as_deref(),
            ApiError::Transport { .. } => None,
        }
    }

    /// 403 raised because the organization has not completed verification
    pub fn is_verification_required(&self) -> bool {
        match self {
            ApiError::Permission { message, .. } => {
                let lower = message.to_ascii_lowercase();
                lower.contains("must be verified") || lower.contains("verify organization")
            }
            _ => false,
        }
    }

    /// Map a non-2xx response into the error taxonomy.
    ///
    /// The body is parsed as an `{error: {message, code, type}}` envelope when
    /// possible, otherwise its text becomes the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let (message, code, error_type) = match envelope {
            Some(ErrorEnvelope { error }) => (error.message, error.code, error.error_type),
            None => (body.trim().to_string(), None, None),
        };
        let message = if message.trim().is_empty() {
            default_message(status)
        } else {
            message
        };
        let status_opt = Some(status);

        let quota_code = code
            .as_deref()
            .into_iter()
            .chain(error_type.as_deref())
            .any(|c| QUOTA_CODES.contains(&c));
        if quota_code || status == 429 {
            return ApiError::Quota {
                status: status_opt,
                message,
                code,
            };
        }

        match status {
            401 => ApiError::Auth {
                status: status_opt,
                message,
                code,
            },
            403 => ApiError::Permission {
                status: status_opt,
                message,
                code,
            },
            500..=599 => ApiError::Server {
                status: status_opt,
                message,
                code,
            },
            _ => ApiError::Validation {
                status: status_opt,
                message,
                code,
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::transport(format!("invalid response body: {err}"))
        } else if err.is_timeout() {
            ApiError::transport(format!("request timed out: {err}"))
        } else {
            ApiError::transport(format!("request failed: {err}"))
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::transport(format!("invalid response JSON: {err}"))
    }
}

fn default_message(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status");
    format!("HTTP {status} {reason}")
}

/// Error body returned by the endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(rename = "type", default)]
    pub(crate) error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(message: &str, code: &str) -> String {
        serde_json::json!({
            "error": { "message": message, "code": code, "type": "invalid_request_error" }
        })
        .to_string()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from_response(401, "").kind(), ApiErrorKind::Auth);
        assert_eq!(ApiError::from_response(403, "").kind(), ApiErrorKind::Permission);
        assert_eq!(ApiError::from_response(429, "").kind(), ApiErrorKind::Quota);
        assert_eq!(ApiError::from_response(400, "").kind(), ApiErrorKind::Validation);
        assert_eq!(ApiError::from_response(503, "").kind(), ApiErrorKind::Server);
    }

    #[test]
    fn test_envelope_message_is_verbatim() {
        let err = ApiError::from_response(401, &envelope("Incorrect API key provided", "invalid_api_key"));
        assert_eq!(err.to_string(), "Incorrect API key provided");
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.code(), Some("invalid_api_key"));
    }

    #[test]
    fn test_billing_code_is_quota_even_on_400() {
        let err = ApiError::from_response(400, &envelope("Billing hard limit has been reached", "billing_hard_limit_reached"));
        assert_eq!(err.kind(), ApiErrorKind::Quota);
    }

    #[test]
    fn test_verification_sub_case() {
        let err = ApiError::from_response(
            403,
            &envelope("Your organization must be verified to use the model `sora-2`", "unverified"),
        );
        assert!(err.is_verification_required());
        assert!(!ApiError::from_response(403, "forbidden").is_verification_required());
    }

    #[test]
    fn test_plain_text_and_empty_bodies() {
        let err = ApiError::from_response(502, "upstream connect error");
        assert_eq!(err.message(), "upstream connect error");

        let err = ApiError::from_response(500, "");
        assert_eq!(err.message(), "HTTP 500 Internal Server Error");
    }
}
