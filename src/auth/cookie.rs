//! Cookie parsing utilities for authentication.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};

use crate::jwt::TokenType;

/// All cookies sent with a request, keyed by name.
///
/// Values keep the order they appeared in across all `Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: HashMap<String, Vec<String>>,
}

impl CookieJar {
    /// Parse every `Cookie` header. Headers that are not valid strings are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::default();
        for value in headers.get_all(header::COOKIE) {
            let Ok(cookie_header) = value.to_str() else {
                continue;
            };
            for part in cookie_header.split(';') {
                if let Some((key, value)) = part.trim().split_once('=') {
                    let key = key.trim();
                    if !key.is_empty() {
                        jar.insert(key, value.trim());
                    }
                }
            }
        }
        jar
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.cookies
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// All values sent under `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.cookies.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value sent under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }
}

/// Pull the access token out of a request's cookies.
///
/// When the cookie is sent more than once, the first occurrence wins.
pub fn extract_access_token(jar: &CookieJar) -> Option<&str> {
    if jar.is_empty() {
        return None;
    }
    jar.get(TokenType::Access.cookie_name())
}
