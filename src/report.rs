use crate::sanitize::UNKNOWN_TYPE;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use url::Url;

/// One entry of a Reporting API batch, decoded with typed defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub report_type: String,
    pub body: Map<String, Value>,
}

impl ReportItem {
    /// Decode a batch element. Returns `None` when the element is not a JSON
    /// object; wrong-typed `type`/`body` fields fall back to their defaults.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let report_type = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_TYPE)
            .to_string();

        let body = object
            .get("body")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Some(ReportItem { report_type, body })
    }

    /// Body field rendered for use in a type label: strings verbatim, any
    /// other JSON value as its compact JSON text.
    pub fn body_label(&self, key: &str) -> Option<String> {
        self.body.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Body field if it is a JSON string.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}

/// The parts of an HTTP request kept for forensic capture.
///
/// Headers come from the server's `HeaderMap`: names are lowercase and
/// repeated headers are grouped under their first occurrence, so the list
/// is not byte-for-byte the order or casing the client sent.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Self {
        let header_list = headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        CapturedRequest {
            method: method.as_str().to_string(),
            url: absolute_url(uri, headers),
            headers: header_list,
            body,
        }
    }
}

/// Server-side requests usually carry only a path; rebuild the absolute URL
/// from the Host header so captures show where the report was sent.
fn absolute_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok());

    match host {
        Some(host) => match Url::parse(&format!("http://{host}")) {
            Ok(base) => base
                .join(&uri.to_string())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| uri.to_string()),
            Err(_) => uri.to_string(),
        },
        None => uri.to_string(),
    }
}
