//! HTTP boundary: response headers, the 429 response, middleware and server.

mod middleware;
mod response;
mod server;

pub use middleware::{rate_limit, CallerId};
pub use response::{
    apply_headers, build_response, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use server::{router, HttpServer};
