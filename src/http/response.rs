//! Rate limit response construction.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ratelimit::RateLimitResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Window end in epoch milliseconds.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitErrorBody<'a> {
    success: bool,
    error: Option<&'a str>,
    rate_limit_info: RateLimitInfo,
}

#[derive(Debug, Serialize)]
struct RateLimitInfo {
    limit: u64,
    remaining: u64,
    reset: u64,
}

/// Attach the `X-RateLimit-*` headers describing `result`.
///
/// Used on the success path to decorate whatever the downstream handler returns.
pub fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(result.reset));
}

/// Build a standalone response for `result`.
///
/// A denied result becomes `429 Too Many Requests` with `Retry-After` and a JSON
/// body carrying the message and limit details. An admitted result becomes an
/// empty `200` with the rate limit headers. The output depends on `result` alone.
pub fn build_response(result: &RateLimitResult) -> Response {
    let mut headers = HeaderMap::new();
    apply_headers(&mut headers, result);

    if result.success {
        return (StatusCode::OK, headers).into_response();
    }

    headers.insert(RETRY_AFTER, HeaderValue::from(result.retry_after.unwrap_or(0)));

    let body = RateLimitErrorBody {
        success: false,
        error: result.error.as_deref(),
        rate_limit_info: RateLimitInfo {
            limit: result.limit,
            remaining: result.remaining,
            reset: result.reset,
        },
    };

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}
