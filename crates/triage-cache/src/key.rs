//! Cache keys and predicate matching.
//!
//! A cached response is addressed by an opaque JSON key
//! `[url, method, bodyRaw, ...]` where `bodyRaw` is the stable serialization
//! of the request body (or `null`). Matching turns the key back into a
//! [`RequestDescriptor`] and hands it to a caller predicate.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use triage_core::{stable_stringify, stable_stringify_value};

/// Reconstructed `(url, method, body)` of a cached request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    /// Parsed request body; the raw string when it was not JSON, `null` when absent.
    pub body: Value,
}

impl RequestDescriptor {
    /// Whether the url starts with `prefix`.
    #[must_use]
    pub fn url_starts_with(&self, prefix: &str) -> bool {
        self.url.starts_with(prefix)
    }

    /// Top-level body field, if the body is an object.
    #[must_use]
    pub fn body_field(&self, name: &str) -> Option<&Value> {
        self.body.as_object()?.get(name)
    }
}

/// Typed form of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    url: String,
    method: String,
    body_raw: Option<String>,
    extra: Vec<Value>,
}

impl QueryKey {
    /// Key for a request without a body.
    #[must_use]
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body_raw: None,
            extra: Vec::new(),
        }
    }

    /// Attach a body; it is stored in stable-serialized form, so bodies that
    /// differ only in key order produce the same key.
    #[must_use]
    pub fn with_body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body_raw = Some(stable_stringify(body));
        self
    }

    /// Append a trailing key element (e.g. an `allowCache` flag). Ignored by
    /// matching.
    #[must_use]
    pub fn with_extra(mut self, value: Value) -> Self {
        self.extra.push(value);
        self
    }

    /// Rebuild a typed key from its opaque form.
    #[must_use]
    pub fn from_value(key: &Value) -> Option<Self> {
        let items = key.as_array()?;
        let url = items.first()?.as_str()?;
        let method = items.get(1)?.as_str()?;
        let body_raw = match items.get(2) {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(other) => Some(stable_stringify_value(other)),
        };
        Some(Self {
            url: url.to_string(),
            method: method.to_string(),
            body_raw,
            extra: items.iter().skip(3).cloned().collect(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn body_raw(&self) -> Option<&str> {
        self.body_raw.as_deref()
    }

    /// Opaque key: `[url, method, bodyRaw|null, ...extra]`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut items = vec![
            Value::String(self.url.clone()),
            Value::String(self.method.clone()),
            self.body_raw.clone().map_or(Value::Null, Value::String),
        ];
        items.extend(self.extra.iter().cloned());
        Value::Array(items)
    }

    /// Canonical string identity used to index the cache.
    #[must_use]
    pub fn stable_id(&self) -> String {
        stable_stringify_value(&self.to_value())
    }

    #[must_use]
    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor {
            url: self.url.clone(),
            method: self.method.clone(),
            body: parse_body(self.body_raw.as_deref()),
        }
    }
}

fn parse_body(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

/// Destructure an opaque key into a request descriptor. Malformed keys
/// (not an array, fewer than two elements, non-string url or method) yield
/// `None`.
#[must_use]
pub fn describe(key: &Value) -> Option<RequestDescriptor> {
    let items = key.as_array()?;
    let url = items.first()?.as_str()?;
    let method = items.get(1)?.as_str()?;
    let body = match items.get(2) {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(raw)) => parse_body(Some(raw)),
        Some(other) => other.clone(),
    };
    Some(RequestDescriptor {
        url: url.to_string(),
        method: method.to_string(),
        body,
    })
}

/// Apply `predicate` to the request behind `key`.
///
/// Malformed keys never match. A panicking predicate is reported at `warn`
/// and counts as a non-match, so one bad predicate cannot abort a sweep.
pub fn matches(key: &Value, predicate: &dyn Fn(&RequestDescriptor) -> bool) -> bool {
    let Some(request) = describe(key) else {
        tracing::debug!(key = %key, "malformed cache key treated as non-match");
        return false;
    };
    match catch_unwind(AssertUnwindSafe(|| predicate(&request))) {
        Ok(matched) => matched,
        Err(payload) => {
            tracing::warn!(
                url = %request.url,
                method = %request.method,
                panic = %panic_payload_message(payload.as_ref()),
                "cache predicate panicked; treating entry as non-match"
            );
            false
        }
    }
}

fn panic_payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
