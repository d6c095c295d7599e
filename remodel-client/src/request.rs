//! Request construction.
//!
//! URLs have the shape `base/endpoint[/key][/action][?k=v&...]`. Path
//! segments and query values are percent-encoded, except dates and
//! datetimes, which are written in their ISO-8601 form as is.

use remodel_model::{FieldValue, QueryValue};
use serde_json::Value;
use std::fmt;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
const JSON: &str = "application/json";

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Only create, replace and partial update send a payload.
    pub fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    /// A request carrying the JSON content type.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![(CONTENT_TYPE.to_string(), JSON.to_string())],
            body: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        self
    }

    /// Attaches a payload. Dropped for methods that carry no body.
    pub fn body(mut self, body: Value) -> Self {
        if self.method.carries_body() {
            self.body = Some(body);
        }
        self
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds `base/endpoint[/key][/action][?query]`.
pub fn build_url(
    base: &str,
    endpoint: &str,
    key: Option<&FieldValue>,
    action: Option<&str>,
    query: &[(String, QueryValue)],
) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in endpoint.split('/').filter(|s| !s.is_empty()) {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    if let Some(key) = key {
        url.push('/');
        url.push_str(&urlencoding::encode(&key.to_string()));
    }
    if let Some(action) = action {
        url.push('/');
        url.push_str(&urlencoding::encode(action.trim_matches('/')));
    }
    if !query.is_empty() {
        let pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), encode_query_value(v)))
            .collect();
        url.push('?');
        url.push_str(&pairs.join("&"));
    }
    url
}

fn encode_query_value(value: &QueryValue) -> String {
    match value {
        QueryValue::Date(_) | QueryValue::DateTime(_) => value.to_string(),
        other => urlencoding::encode(&other.to_string()).into_owned(),
    }
}
