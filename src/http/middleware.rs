//! Axum middleware enforcing the rate limiter.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::instrument;

use super::response::{apply_headers, build_response};
use crate::ratelimit::RateLimiter;

/// Explicit caller identity for rate limiting.
///
/// An authentication layer running before [`rate_limit`] can insert this into the
/// request extensions so the caller is counted by user id instead of address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

/// Count the request, reject it with 429 when over the limit, otherwise run the
/// rest of the stack and add the rate limit headers to its response.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let explicit = request.extensions().get::<CallerId>().map(|id| id.0.as_str());
    let result = limiter.apply(&request, explicit);

    if !result.success {
        return build_response(&result);
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &result);
    response
}
