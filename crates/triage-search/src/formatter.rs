//! Typed ⇄ query-string conversion for a [`SearchFormat`].
//!
//! Array fields travel as deltas against their defaults:
//! - `value` adds a token
//! - `!(value)` removes a default token
//! - `NOT(value)` is a negated filter and counts as its own token
//!
//! Tokens are compared by their *bare* value (every prefix layer stripped),
//! so a negated `NOT(x)` in the delta replaces a plain `x` default. When
//! several tokens share a bare value the last one wins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use triage_core::Config;
use triage_core::config::{DEFAULT_NOT_PREFIX, DEFAULT_REMOVE_PREFIX};

use crate::field::{FieldKind, FieldSpec, FieldValue};
use crate::format::SearchFormat;
use crate::params::ParamsState;

/// Decoded parameters keyed by field name, in declaration order.
pub type TypedParams = IndexMap<String, FieldValue>;

/// Prefixes used to mark negated and removed array tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefixes {
    pub not: String,
    pub remove: String,
}

impl Default for Prefixes {
    fn default() -> Self {
        Self {
            not: DEFAULT_NOT_PREFIX.to_string(),
            remove: DEFAULT_REMOVE_PREFIX.to_string(),
        }
    }
}

impl Prefixes {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            not: config.not_prefix.clone(),
            remove: config.remove_prefix.clone(),
        }
    }

    /// `!(value)`
    #[must_use]
    pub fn removal(&self, value: &str) -> String {
        format!("{}({value})", self.remove)
    }

    /// `NOT(value)`
    #[must_use]
    pub fn negation(&self, value: &str) -> String {
        format!("{}({value})", self.not)
    }

    /// Split a token into its flags and bare value. Prefix layers are
    /// peeled in any order and any depth: `NOT(!(x))` is removed and negated.
    #[must_use]
    pub fn split<'a>(&self, token: &'a str) -> Token<'a> {
        let mut out = Token {
            raw: token,
            bare: token,
            negated: false,
            removed: false,
        };
        loop {
            if let Some(inner) = unwrap_call(&self.remove, out.bare) {
                out.removed = true;
                out.bare = inner;
            } else if let Some(inner) = unwrap_call(&self.not, out.bare) {
                out.negated = true;
                out.bare = inner;
            } else {
                return out;
            }
        }
    }
}

/// `prefix(inner)` → `inner`.
fn unwrap_call<'a>(prefix: &str, token: &'a str) -> Option<&'a str> {
    token
        .strip_prefix(prefix)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// A parsed array token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub raw: &'a str,
    pub bare: &'a str,
    pub negated: bool,
    pub removed: bool,
}

/// Set union: every element of `a` (first occurrence), then the elements of
/// `b` not already present.
#[must_use]
pub fn merge_array(a: &[String], b: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(a.len() + b.len());
    for item in a.iter().chain(b) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Converts between [`ParamsState`] and [`TypedParams`] for one format.
#[derive(Debug, Clone, Default)]
pub struct SearchFormatter {
    format: SearchFormat,
    prefixes: Prefixes,
}

impl SearchFormatter {
    #[must_use]
    pub fn new(format: SearchFormat) -> Self {
        Self::with_prefixes(format, Prefixes::default())
    }

    /// Formatter with custom token prefixes. Array defaults are brought
    /// into canonical form (one token per bare value, removals dropped).
    #[must_use]
    pub fn with_prefixes(mut format: SearchFormat, prefixes: Prefixes) -> Self {
        let this = Self {
            format: SearchFormat::new(),
            prefixes,
        };
        for spec in format.specs_mut() {
            if let FieldValue::List(items) = &spec.default {
                let canonical = this.apply_array_delta::<String>(&[], items);
                spec.default = FieldValue::List(canonical);
            }
        }
        Self { format, ..this }
    }

    #[must_use]
    pub const fn search_format(&self) -> &SearchFormat {
        &self.format
    }

    #[must_use]
    pub const fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    pub(crate) const fn format_mut(&mut self) -> &mut SearchFormat {
        &mut self.format
    }

    /// Token-exact set difference: elements of `a` missing from `b` as-is,
    /// then elements of `b` missing from `a` as removals. Array encoding
    /// compares by bare value instead, see [`SearchFormatter::format`].
    #[must_use]
    pub fn diff_array(&self, a: &[String], b: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in a {
            if !b.contains(item) && !out.contains(item) {
                out.push(item.clone());
            }
        }
        for item in b {
            if a.contains(item) {
                continue;
            }
            let removal = self.prefixes.removal(item);
            if !out.contains(&removal) {
                out.push(removal);
            }
        }
        out
    }

    /// Resolve a delta against defaults. Tokens are read defaults first, then
    /// the delta, and the last token for each bare value wins. Removals are
    /// then dropped and the result is sorted by bare value. Empty tokens are
    /// ignored.
    #[must_use]
    pub fn apply_array_delta<S: AsRef<str>>(&self, delta: &[S], defaults: &[String]) -> Vec<String> {
        let mut winners: Vec<Token<'_>> = Vec::new();
        let tokens = defaults
            .iter()
            .map(String::as_str)
            .chain(delta.iter().map(AsRef::as_ref))
            .rev();
        for raw in tokens {
            if raw.is_empty() {
                continue;
            }
            let token = self.prefixes.split(raw);
            if !winners.iter().any(|w| w.bare == token.bare) {
                winners.push(token);
            }
        }
        winners.retain(|t| !t.removed);
        winners.sort_by(|a, b| a.bare.cmp(b.bare).then_with(|| a.raw.cmp(b.raw)));
        winners.into_iter().map(|t| t.raw.to_string()).collect()
    }

    /// Decode raw parameters into typed values. Missing or invalid input
    /// falls back to each field's default; unknown keys are ignored.
    #[must_use]
    pub fn parse(&self, raw: &ParamsState) -> TypedParams {
        self.format
            .iter()
            .map(|(name, spec)| {
                let value = if spec.locked {
                    spec.default.clone()
                } else {
                    self.coerce(name, spec, &raw.get_all(name))
                };
                (name.to_string(), value)
            })
            .collect()
    }

    /// Encode typed values as a minimal delta against the defaults.
    ///
    /// An array emits its tokens that are not exactly a default, plus a
    /// removal for every default whose bare value no longer appears.
    #[must_use]
    pub fn format(&self, typed: &TypedParams) -> ParamsState {
        self.encode(typed, false)
    }

    /// Encode every declared field, including those at their default.
    #[must_use]
    pub fn format_full(&self, typed: &TypedParams) -> ParamsState {
        self.encode(typed, true)
    }

    /// Current default of every field.
    #[must_use]
    pub fn defaults(&self) -> TypedParams {
        self.format
            .iter()
            .map(|(name, spec)| (name.to_string(), spec.default.clone()))
            .collect()
    }

    fn encode(&self, typed: &TypedParams, emit_all: bool) -> ParamsState {
        let mut out = ParamsState::new();
        for (name, spec) in self.format.iter() {
            let value = if spec.locked {
                spec.default.clone()
            } else {
                typed
                    .get(name)
                    .map_or_else(|| spec.default.clone(), |v| self.normalize(name, spec, v))
            };
            let always = emit_all || spec.enforced;

            match (&value, &spec.default) {
                (FieldValue::List(items), FieldValue::List(defaults)) => {
                    let mut tokens = self.array_delta(items, defaults, always);
                    if always && tokens.is_empty() {
                        // Keeps the key present; empty tokens decode to nothing.
                        tokens.push(String::new());
                    }
                    for token in tokens {
                        out.append(name, token);
                    }
                }
                _ => {
                    if (always || value != spec.default)
                        && let Some(text) = value.to_param_string()
                    {
                        out.append(name, text);
                    }
                }
            }
        }
        out.sort();
        out
    }

    /// Tokens that turn `defaults` into `items`, both canonical. With `all`
    /// every item is written, not only those that differ from a default.
    fn array_delta(&self, items: &[String], defaults: &[String], all: bool) -> Vec<String> {
        let kept: Vec<&str> = items.iter().map(|i| self.prefixes.split(i).bare).collect();
        let mut tokens: Vec<(&str, String)> = items
            .iter()
            .zip(&kept)
            .filter(|(item, _)| all || !defaults.contains(*item))
            .map(|(item, bare)| (*bare, item.clone()))
            .collect();
        for default in defaults {
            let bare = self.prefixes.split(default).bare;
            if !kept.contains(&bare) {
                tokens.push((bare, self.prefixes.removal(default)));
            }
        }
        tokens.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));
        tokens.into_iter().map(|(_, token)| token).collect()
    }

    /// Coerce raw query values for one field.
    pub(crate) fn coerce(&self, name: &str, spec: &FieldSpec, raw: &[&str]) -> FieldValue {
        let first = raw.first().copied();
        if spec.nullable && first == Some("null") {
            return FieldValue::Null;
        }
        match &spec.kind {
            FieldKind::Number => match first.map(|s| s.trim().parse::<f64>()) {
                Some(Ok(n)) if n.is_finite() => FieldValue::Number(spec.clamp(n)),
                Some(_) => {
                    tracing::debug!(field = name, value = ?first, "non-numeric value, using default");
                    spec.default.clone()
                }
                None => spec.default.clone(),
            },
            FieldKind::Boolean => first.map_or_else(
                || spec.default.clone(),
                |s| FieldValue::Bool(s == "true"),
            ),
            FieldKind::String => first.map_or_else(
                || spec.default.clone(),
                |s| FieldValue::Text(s.to_string()),
            ),
            FieldKind::Enum { .. } => match first {
                Some(s) if spec.accepts_option(s) => FieldValue::Text(s.to_string()),
                Some(s) => {
                    tracing::debug!(field = name, value = s, "value outside enum options, using default");
                    spec.default.clone()
                }
                None => spec.default.clone(),
            },
            FieldKind::Array => {
                let defaults = spec.default.as_list().unwrap_or_default();
                FieldValue::List(self.apply_array_delta(raw, defaults))
            }
        }
    }

    /// Bring a caller-supplied typed value into canonical form.
    fn normalize(&self, name: &str, spec: &FieldSpec, value: &FieldValue) -> FieldValue {
        if !spec.accepts(value) {
            tracing::debug!(field = name, kind = %spec.kind, "value does not match field kind, using default");
            return spec.default.clone();
        }
        match value {
            FieldValue::Number(n) if n.is_finite() => FieldValue::Number(spec.clamp(*n)),
            FieldValue::Number(_) => spec.default.clone(),
            FieldValue::Text(s) if !spec.accepts_option(s) => spec.default.clone(),
            FieldValue::List(items) => FieldValue::List(self.apply_array_delta(items.as_slice(), &[])),
            other => other.clone(),
        }
    }
}
