//! Client identity extraction from proxy headers.
//!
//! Priority: `CF-Connecting-IP` -> rightmost `X-Forwarded-For` -> `X-Real-IP`
//! -> socket peer address -> the shared `"default"` identity.
//!
//! ```ignore
//! async fn handler(ClientIdentity(identity): ClientIdentity, ...) -> impl IntoResponse { ... }
//! ```

use crate::session::IdentityKey;
use axum::extract::{ConnectInfo, FromRequestParts};
use http::request::Parts;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// The identity a request's session belongs to.
pub struct ClientIdentity(pub IdentityKey);

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIdentity(resolve_identity(&parts.headers, peer)))
    }
}

pub fn resolve_identity(headers: &http::HeaderMap, peer: Option<IpAddr>) -> IdentityKey {
    let parse = |s: &str| s.trim().parse::<IpAddr>().ok();

    let ip = header_str(headers, "cf-connecting-ip")
        .and_then(parse)
        .or_else(|| {
            header_str(headers, "x-forwarded-for")
                .and_then(|xff| xff.rsplit(',').next())
                .and_then(parse)
        })
        .or_else(|| header_str(headers, "x-real-ip").and_then(parse))
        .or(peer);

    match ip {
        Some(ip) => IdentityKey::new(ip.to_string()),
        None => IdentityKey::default_identity(),
    }
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
