//! Per-caller throttling keys.

use std::net::IpAddr;

use super::cookie::{CookieJar, extract_access_token};
use super::ip::{ClientIpHeader, HasHeadersAndExtensions, extract_client_ip};

/// Bucket identifier for the rate limiter: the raw access token when the
/// caller sent one, otherwise the hex SHA-256 of the caller's IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn from_ip(ip: IpAddr) -> Self {
        let digest = openssl::sha::sha256(ip.to_string().as_bytes());
        Self(hex::encode(digest))
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the [`ClientKey`] of a request. Never fails for a request that
/// came in through a listener with connect info.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientKeyResolver {
    ip_header: Option<ClientIpHeader>,
}

impl ClientKeyResolver {
    pub fn new(ip_header: Option<ClientIpHeader>) -> Self {
        Self { ip_header }
    }

    /// # Panics
    ///
    /// Panics when the request has no access token and no resolvable client
    /// address, which means the server was started without connect info.
    pub fn resolve<T: HasHeadersAndExtensions>(&self, source: &T) -> ClientKey {
        let jar = CookieJar::from_headers(source.headers());
        resolve_client_key(&jar, || extract_client_ip(source, self.ip_header))
    }
}

/// Prefer a non-empty access token; otherwise hash the client IP.
pub fn resolve_client_key(jar: &CookieJar, client_ip: impl FnOnce() -> Option<IpAddr>) -> ClientKey {
    if let Some(token) = extract_access_token(jar).filter(|token| !token.is_empty()) {
        return ClientKey(token.to_string());
    }

    let ip = client_ip()
        .expect("client address unavailable: serve with into_make_service_with_connect_info");
    ClientKey::from_ip(ip)
}
