use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};

/// Longest user agent stored alongside a token.
const MAX_USER_AGENT_LEN: usize = 512;

/// Where a request came from. Recorded on refresh and reset tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// Builds the context from request headers and extensions.
    #[must_use]
    pub fn from_request(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> Self {
        let peer = extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
        Self {
            ip: client_ip(headers, peer, trust_proxy),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Extract User-Agent header value from HTTP headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.chars().take(MAX_USER_AGENT_LEN).collect())
}

/// Resolve the client IP.
///
/// With `trust_proxy` the left-most `X-Forwarded-For` entry wins; otherwise
/// only the socket peer address is used, since the header is client-controlled.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<String> {
    if trust_proxy
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return Some(forwarded.to_string());
    }

    peer.map(|addr| addr.ip().to_string())
}
