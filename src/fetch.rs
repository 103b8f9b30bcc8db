//! Authenticated Fetch
//!
//! Request descriptions are plain data so the engines can build them without a
//! browser; `authenticated_request` performs them with gloo-net on wasm.

use tracing::debug;

use crate::location::encode_component;
use crate::token::{is_safe_method, TokenSource};

/// Exact body the server sends when the client's view is out of date
pub const RELOAD_SENTINEL: &str = "reload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// `application/x-www-form-urlencoded` body; fields may repeat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    /// Body with `name` repeated once per value
    pub fn repeated<I, V>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let mut body = Self::new();
        for value in values {
            body.push(name, value.as_ref());
        }
        body
    }

    /// Values of every `name` field, in order
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn encode(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{}={}", encode_component(name), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<FormBody>,
    pub headers: Vec<(String, String)>,
}

impl FragmentRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), body: None, headers: Vec::new() }
    }

    pub fn post(url: impl Into<String>, body: FormBody) -> Self {
        Self { method: Method::Post, url: url.into(), body: Some(body), headers: Vec::new() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Attach the anti-forgery header when the method is unsafe. A missing
    /// token leaves the request as it is.
    pub fn authenticated(self, tokens: &dyn TokenSource, token_header: &str) -> Self {
        if is_safe_method(self.method.as_str()) {
            return self;
        }
        match tokens.get_token() {
            Some(token) => self.with_header(token_header, &token),
            None => {
                debug!(target: "fetch", url = %self.url, "no anti-forgery token available");
                self
            }
        }
    }
}

/// Server response body, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Markup(String),
    /// Stale-client sentinel
    Reload,
}

impl Fragment {
    pub fn classify(body: String) -> Self {
        if body == RELOAD_SENTINEL {
            Fragment::Reload
        } else {
            Fragment::Markup(body)
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod transport {
    use gloo_net::http::Request;

    use super::{FragmentRequest, Method};
    use crate::error::SyncError;
    use crate::token::TokenSource;

    fn map_network_error(error: gloo_net::Error) -> SyncError {
        SyncError::network(error.to_string())
    }

    /// Perform `req`, attaching the anti-forgery header to unsafe methods.
    /// Returns the body text of a 2xx response.
    pub async fn authenticated_request(
        req: FragmentRequest,
        tokens: &dyn TokenSource,
        token_header: &str,
    ) -> Result<String, SyncError> {
        let req = req.authenticated(tokens, token_header);
        let mut builder = match req.method {
            Method::Get => Request::get(&req.url),
            Method::Post => Request::post(&req.url),
        };
        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }

        let response = match req.body {
            Some(body) => {
                let request = builder
                    .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
                    .body(body.encode())
                    .map_err(map_network_error)?;
                request.send().await.map_err(map_network_error)?
            }
            None => builder.send().await.map_err(map_network_error)?,
        };

        let status = response.status();
        if !response.ok() {
            return Err(SyncError::status(status, response.status_text()));
        }
        response.text().await.map_err(map_network_error)
    }
}

#[cfg(target_arch = "wasm32")]
pub use transport::authenticated_request;
