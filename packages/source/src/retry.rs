//! HTTP retry helpers for transient errors.
//!
//! Feed fetchers go through [`send_json`] or [`send_text`] rather than
//! calling `reqwest::RequestBuilder::send()` directly, so every request
//! retries timeouts, connection resets, 429 and 5xx with exponential
//! backoff. Client errors other than 429 fail immediately.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url)).await?;
//! let csv = retry::send_text(|| client.get(&url)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Retry attempts after the first request. Backoff is 2s, 4s, 8s.
const MAX_RETRIES: u32 = 3;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends a request and parses the response body as JSON.
///
/// `build_request` is called once per attempt, since builders are consumed
/// by `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries,
/// the server answers with a non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let text = send_text(build_request).await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed: {e}\n  received: {} bytes\n  body preview: {preview}",
            text.len()
        );
        SourceError::Json(e)
    })
}

/// Sends a request and returns the response body as a `String`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries,
/// the server answers with a non-retryable status, or the body cannot be
/// read.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    let url = response.url().to_string();
    let text = response.text().await?;
    log::debug!("Fetched {} bytes from {url}", text.len());
    Ok(text)
}

/// Shared retry loop. Returns the first response with a 2xx or 3xx status.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}");
                        attempt += 1;
                        continue;
                    }
                    return Err(SourceError::Malformed {
                        message: format!("HTTP {status} after {max_retries} retries"),
                    });
                }
                if status.is_client_error() {
                    return Err(SourceError::Malformed {
                        message: format!("HTTP {status}"),
                    });
                }
                return Ok(response);
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::OK));
    }
}
