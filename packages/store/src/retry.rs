//! HTTP retry helper for the remote store.
//!
//! Every request the [`crate::HttpSurveyStore`] makes goes through
//! [`send_json`], which retries transient failures (timeouts, connection
//! resets, HTTP 429 and 5xx, truncated bodies) with exponential backoff.
//! The session layer above applies its own overall timeout, so the budget
//! here is kept short.

use std::time::Duration;

use crate::StoreError;

/// Maximum number of retries after the first attempt.
///
/// With backoff of 250ms, 500ms, 1s the total wait before giving up is
/// under two seconds.
const MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubled on each subsequent one.
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends a request and parses the response body as JSON.
///
/// `build_request` is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `send()`.
///
/// HTTP 4xx other than 429 is permanent and returned immediately.
///
/// # Errors
///
/// Returns [`StoreError`] if the request still fails after all retries,
/// the server returns a non-retryable status, or the body is not JSON.
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, StoreError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut last_error: Option<StoreError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = BASE_DELAY * (1u32 << (attempt - 1));
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) => {
                log::warn!("  transient error: {e}");
                last_error = Some(StoreError::Http(e));
                continue;
            }
            Err(e) => return Err(StoreError::Http(e)),
        };

        let status = response.status();
        let url = response.url().to_string();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            log::warn!("  HTTP {status} from {url}");
            last_error = Some(StoreError::Backend {
                message: format!("HTTP {status}"),
            });
            continue;
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("  body read failed for {url}: {e}");
                last_error = Some(StoreError::Http(e));
                continue;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!(
                    "  JSON parse failed for {url} ({} bytes): {e}\n  body preview: {}",
                    text.len(),
                    preview(&text)
                );
                last_error = Some(StoreError::Json(e));
            }
        }
    }

    log::error!("Request failed after {MAX_RETRIES} retries, giving up");
    Err(last_error.unwrap_or_else(|| StoreError::Backend {
        message: "request failed after all retries".to_string(),
    }))
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
