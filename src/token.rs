//! Token Provider
//!
//! Reads the anti-forgery token from the cookie store. Absence is not an
//! error: the request still goes out and the server may reject it.

use percent_encoding::percent_decode_str;
use wasm_bindgen::JsCast;

/// Source of the anti-forgery token
pub trait TokenSource {
    fn get_token(&self) -> Option<String>;
}

/// Value of cookie `name` in a `document.cookie` string; first match wins
pub fn parse_cookie(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| percent_decode_str(value.trim()).decode_utf8_lossy().into_owned())
        .filter(|value| !value.is_empty())
}

/// Methods that never carry the anti-forgery header
pub fn is_safe_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "HEAD" | "OPTIONS" | "TRACE"
    )
}

/// Token read from `document.cookie` on every call
#[derive(Debug, Clone)]
pub struct CookieToken {
    name: String,
}

impl CookieToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TokenSource for CookieToken {
    fn get_token(&self) -> Option<String> {
        let document = web_sys::window()?.document()?;
        let cookies = document.dyn_into::<web_sys::HtmlDocument>().ok()?.cookie().ok()?;
        parse_cookie(&cookies, &self.name)
    }
}

/// Fixed token, for tests and pages that embed the token directly
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn get_token(&self) -> Option<String> {
        self.0.clone()
    }
}
