use thiserror::Error;

/// Errors returned by session construction, authentication and calls.
///
/// Authentication failures are not always errors: `authenticate`,
/// `storage_url` and `cdn_url` report them through their return value and
/// the recorded [`LastError`], while `token` and `management_url` turn them
/// into [`Error::Runtime`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Runtime(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Failures raised by a [`Transport`](super::Transport) or by a response
/// that cannot be interpreted.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error state recorded after a failed HTTP exchange.
///
/// The message is the raw response body and the code is the raw status,
/// both stored as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub code: u16,
}

impl LastError {
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

/// Maximum length for response bodies written to log fields
const MAX_LOGGED_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument("The user cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid argument: The user cannot be empty");

        let err = Error::Runtime("Authentication failed".to_string());
        assert_eq!(err.to_string(), "Authentication failed");

        let err: Error = TransportError::MalformedResponse("missing header".to_string()).into();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.to_string(), "Transport error: Malformed response: missing header");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("unauthorized"), "unauthorized");

        let long = "a".repeat(MAX_LOGGED_BODY_LENGTH + 10);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"a".repeat(MAX_LOGGED_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 510 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // 'é' is two bytes, so byte 500 falls inside a character
        let body = format!("a{}", "é".repeat(300));
        let truncated = truncate_body(&body);
        assert!(truncated.contains("... (truncated"));
    }
}
