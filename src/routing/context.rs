//! Per-request context threaded through the middleware chain.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use std::net::SocketAddr;

/// Values resolved for a single request.
///
/// Created by the router from the raw request and refined by the IP and host
/// resolvers before it reaches a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Peer address of the TCP connection, when known.
    pub peer_addr: Option<SocketAddr>,
    /// Client IP. Raw peer address until the IP resolver runs.
    pub client_ip: String,
    /// Logical host. Request host until the host resolver runs.
    pub host: String,
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        let peer_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            peer_addr,
            client_ip: peer_addr.map(|addr| addr.to_string()).unwrap_or_default(),
            host: request_host(req),
        }
    }

    /// Raw peer address as `ip:port`, empty when unknown.
    pub fn remote_addr(&self) -> String {
        self.peer_addr.map(|addr| addr.to_string()).unwrap_or_default()
    }
}

/// Host header, falling back to the URI authority.
pub fn request_host(req: &Request<Body>) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|authority| authority.to_string()))
        .unwrap_or_default()
}
