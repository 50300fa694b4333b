//! Per-client request rate limiting
//!
//! A lazy token bucket per client key. Keys come from the first
//! `X-Forwarded-For` entry when present, else the peer address.

mod bucket;
mod limiter;

use std::net::IpAddr;

use axum::http::HeaderMap;

pub use bucket::{RateBucket, RateDecision};
pub use limiter::{Clock, ManualClock, RateLimiter, SystemClock};

/// Header carrying the original client address behind a proxy
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Key used when neither a forwarded address nor a peer address is known
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the rate-limit key for a request
pub fn client_key(headers: &HeaderMap, remote: Option<IpAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, remote) {
        (Some(first), _) => first.to_string(),
        (None, Some(ip)) => ip.to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}
