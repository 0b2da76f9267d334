use http::Method;
use serde::{Deserialize, Serialize};

use super::headers::HeadersInit;
use crate::{Error, Result};

/// Redirect handling requested for an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Redirect {
    Follow,
    Error,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Options of an outbound request, the counterpart of a fetch `RequestInit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub body: Option<Body>,
    pub headers: HeadersInit,
    pub keepalive: bool,
    pub redirect: Option<Redirect>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = headers.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// The effective method, `GET` when none was given.
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Whether the body can be carried by a [`SerializedRequest`].
    pub fn has_representable_body(&self) -> bool {
        !matches!(self.body, Some(Body::Bytes(_)))
    }
}

/// The wire form of an outbound request sent to the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub keepalive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

fn default_method() -> String {
    Method::GET.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Converts a url and its options into the wire form.
///
/// Only text bodies are copied; empty bodies and empty header lists are
/// omitted. Use [`SerializedRequest::strict`] to reject byte bodies instead of
/// dropping them.
pub fn serialize_request(url: &str, options: &RequestOptions) -> SerializedRequest {
    let body = match &options.body {
        Some(Body::Text(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    };
    SerializedRequest {
        url: url.to_string(),
        method: options.method().to_string(),
        body,
        headers: options.headers.normalize(),
        keepalive: options.keepalive,
        redirect: options.redirect,
    }
}

impl SerializedRequest {
    pub fn strict(url: &str, options: &RequestOptions) -> Result<Self> {
        if !options.has_representable_body() {
            return Err(Error::UnrepresentableBody);
        }
        Ok(serialize_request(url, options))
    }

    pub fn to_options(&self) -> Result<RequestOptions> {
        let method = Method::from_bytes(self.method.as_bytes()).map_err(Error::decode)?;
        Ok(RequestOptions {
            method: Some(method),
            body: self.body.clone().map(Body::Text),
            headers: HeadersInit::Pairs(self.headers.clone()),
            keepalive: self.keepalive,
            redirect: self.redirect,
        })
    }
}
