//! Shared HTTP error mapping for the generation clients.

use std::time::Duration;

use concord_core::generation::GenerationError;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;

/// Maps a non-success HTTP status to a backend error, marking the usual
/// transient statuses as retryable.
pub(crate) fn backend_error(
    status: StatusCode,
    message: String,
    retry_after: Option<Duration>,
) -> GenerationError {
    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    GenerationError::Backend {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
        retry_after,
    }
}

/// Maps a transport-level failure (connect, timeout) before any response.
pub(crate) fn transport_error(err: reqwest::Error) -> GenerationError {
    GenerationError::Transport(err.to_string())
}

pub(crate) fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}
