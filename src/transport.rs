//! Cookie transport capability.
//!
//! The session manager never touches HTTP messages directly. It reads the
//! session cookie and writes Set-Cookie directives through
//! [`CookieTransport`], which host frameworks implement over their own
//! request and response types.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use cookie::Cookie;

/// Read request cookies and emit response cookies.
pub trait CookieTransport {
    /// Value of the request cookie called `name`, if present.
    fn request_cookie(&self, name: &str) -> Option<String>;

    /// Add a Set-Cookie directive to the response.
    fn set_cookie(&mut self, cookie: Cookie<'static>);
}

/// [`CookieTransport`] over a pair of header maps.
///
/// Reads `Cookie` headers from the request map and appends `Set-Cookie`
/// headers to the response map.
#[derive(Debug)]
pub struct HeaderTransport<'a> {
    request: &'a HeaderMap,
    response: &'a mut HeaderMap,
}

impl<'a> HeaderTransport<'a> {
    pub fn new(request: &'a HeaderMap, response: &'a mut HeaderMap) -> Self {
        Self { request, response }
    }
}

impl CookieTransport for HeaderTransport<'_> {
    fn request_cookie(&self, name: &str) -> Option<String> {
        self.request
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string())
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.response.append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(cookie = %cookie.name(), error = %e, "dropping unencodable cookie"),
        }
    }
}
