//! Carriers move the session id between client and server.
//!
//! The session layer only ever reads and writes one opaque value through a
//! [`Carrier`]. HTTP uses cookies; a persistent connection reuses the
//! cookies from its upgrade request.

use std::time::Duration;

use cookie::{Cookie, CookieJar};

/// Per-request key/value transport for the session id.
pub trait Carrier {
    /// The value stored under `name`, if the client sent one.
    fn get(&self, name: &str) -> Option<String>;

    /// Stores `value` under `name`, to expire after `max_age`.
    fn set(&mut self, name: &str, value: &str, max_age: Duration);
}

/// A cookie-backed [`Carrier`].
///
/// Built from the raw `Cookie` request headers. Values written with
/// [`set`](Carrier::set) are collected and can be emitted as `Set-Cookie`
/// headers via [`set_cookie_headers`](Self::set_cookie_headers).
#[derive(Debug, Clone, Default)]
pub struct CookieCarrier {
    jar: CookieJar,
}

impl CookieCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every `Cookie` header value. Malformed pairs are skipped.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut jar = CookieJar::new();
        for header in headers {
            for cookie in Cookie::split_parse(header.to_owned()).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }
        Self { jar }
    }

    /// One `Set-Cookie` header value per cookie changed through this carrier.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar.delta().map(|cookie| cookie.to_string()).collect()
    }
}

impl Carrier for CookieCarrier {
    fn get(&self, name: &str) -> Option<String> {
        self.jar.get(name).map(|cookie| cookie.value().to_string())
    }

    fn set(&mut self, name: &str, value: &str, max_age: Duration) {
        let secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let cookie = Cookie::build((name.to_owned(), value.to_owned()))
            .path("/")
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(secs))
            .build();
        self.jar.add(cookie);
    }
}
