//! Forwarding admitted requests to the upstream API.
//!
//! Upstream failures are this handler's own errors: 502 when the upstream
//! cannot be reached, 504 when it does not answer in time. The limiter has
//! already counted the request either way.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, InvalidUri, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::config::UpstreamConfig;
use crate::http::request::request_id;
use crate::http::response::json_error;
use crate::http::server::AppState;
use crate::observability::metrics;

/// HTTP client bound to one upstream authority.
pub struct UpstreamForwarder {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    timeout: Duration,
}

impl UpstreamForwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, InvalidUri> {
        let authority = config.address.parse::<Authority>()?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Send `request` upstream with its path and query preserved.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let id = request_id(&request).to_string();
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let uri = match Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
        {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "Failed to build upstream URI");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        // Let the client derive Host from the upstream URI.
        parts.headers.remove(header::HOST);

        tracing::debug!(request_id = %id, uri = %parts.uri, "Forwarding request upstream");

        let upstream_request = Request::from_parts(parts, body);
        match time::timeout(self.timeout, self.client.request(upstream_request)).await {
            Ok(Ok(response)) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Ok(Err(e)) => {
                tracing::error!(request_id = %id, upstream = %self.authority, error = %e, "Upstream error");
                metrics::record_upstream_error("connect");
                json_error(StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
            Err(_) => {
                tracing::error!(request_id = %id, upstream = %self.authority, timeout = ?self.timeout, "Upstream timed out");
                metrics::record_upstream_error("timeout");
                json_error(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out")
            }
        }
    }
}

/// Handler for every route under the gated prefix.
pub async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.upstream.forward(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_authority_address() {
        let config = UpstreamConfig {
            address: "http://localhost:3000/".into(),
            timeout_secs: 1,
        };
        assert!(UpstreamForwarder::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = UpstreamForwarder::new(&UpstreamConfig {
            address: addr.to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        let request = Request::builder()
            .uri("/api/chat?q=1")
            .body(Body::empty())
            .unwrap();
        let response = forwarder.forward(request).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
