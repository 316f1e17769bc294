//! Caller identity derivation.
//!
//! The forwarded-for identity is only as trustworthy as the proxy in front
//! of this service. Without a trusted reverse proxy any client can pick its
//! own bucket, so treat it as abuse throttling, not access control.

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, Request},
};

use crate::config::IdentitySource;
use crate::ratelimit::UNKNOWN_IDENTITY;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First entry of `X-Forwarded-For`, or `unknown`.
pub fn forwarded_for(headers: &HeaderMap) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(UNKNOWN_IDENTITY)
        .to_string()
}

/// IP of the TCP peer, or `unknown` when the connection info is missing.
pub fn peer_address<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

/// Derive the rate limit identity for a request.
pub fn client_identity<B>(source: IdentitySource, request: &Request<B>) -> String {
    match source {
        IdentitySource::ForwardedFor => forwarded_for(request.headers()),
        IdentitySource::PeerAddress => peer_address(request),
    }
}
