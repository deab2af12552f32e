//! Request metadata.
//!
//! # Responsibilities
//! - Determine the client IP, honouring trusted reverse proxies
//! - Generate the UUID v4 request ID set by the request-id layers
//!
//! # Design Decisions
//! - Only the configured number of proxies is trusted; the client address
//!   is read that many entries from the right of `X-Forwarded-For`
//! - A header with too few or unparseable entries falls back to the peer

use std::net::IpAddr;

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the per-request UUID.
pub const X_REQUEST_ID: &str = "x-request-id";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Generates a UUID v4 for every request without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Client address attached to authorized requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Returns the client address of a request.
///
/// With `proxy_count = 0` this is the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: IpAddr, proxy_count: usize) -> IpAddr {
    if proxy_count == 0 {
        return peer;
    }

    let forwarded: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    if forwarded.len() < proxy_count {
        return peer;
    }

    let entry = forwarded[forwarded.len() - proxy_count];
    match entry.parse() {
        Ok(ip) => ip,
        Err(_) => {
            tracing::debug!(entry, "Unparseable X-Forwarded-For entry, using peer address");
            peer
        }
    }
}
