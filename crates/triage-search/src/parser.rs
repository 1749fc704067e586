//! Query-string normalization on top of a [`SearchFormatter`].
//!
//! Every operation returns a [`SearchParams`]: the encoded query plus the
//! typed values it decodes to. `delta_params` is the workhorse. It decodes a
//! stored or incoming query and re-encodes it against the defaults, so the
//! output is the minimal query that reproduces the same view.

use serde::{Deserialize, Serialize};

use triage_core::{Config, Result};

use crate::field::{FieldSpec, FieldValue};
use crate::format::SearchFormat;
use crate::formatter::{Prefixes, SearchFormatter, TypedParams};
use crate::params::ParamsState;
use crate::result::SearchParams;
use crate::store::ParamStore;

/// Which input a merged field takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSide {
    Left,
    Right,
    /// Drop both inputs and use the field default.
    Default,
}

/// Parser for one declared search format.
#[derive(Debug, Clone, Default)]
pub struct SearchParser {
    formatter: SearchFormatter,
}

impl SearchParser {
    #[must_use]
    pub fn new(format: SearchFormat) -> Self {
        Self {
            formatter: SearchFormatter::new(format),
        }
    }

    #[must_use]
    pub const fn with_formatter(formatter: SearchFormatter) -> Self {
        Self { formatter }
    }

    /// Parser whose token prefixes come from configuration.
    #[must_use]
    pub fn from_config(format: SearchFormat, config: &Config) -> Self {
        Self::with_formatter(SearchFormatter::with_prefixes(
            format,
            Prefixes::from_config(config),
        ))
    }

    /// Mark fields as enforced. Unknown names are ignored.
    #[must_use]
    pub fn with_enforced(mut self, names: &[&str]) -> Self {
        for name in names {
            match self.formatter.format_mut().get_mut(name) {
                Some(spec) => spec.enforced = true,
                None => tracing::warn!(field = *name, "enforced field is not declared; ignoring"),
            }
        }
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, raw: &ParamsState) -> Self {
        self.set_defaults(raw);
        self
    }

    /// Replace defaults with the values carried by `raw`. Fields absent from
    /// `raw` keep their current default. Array values are resolved against
    /// the current default, and numbers are clamped.
    pub fn set_defaults(&mut self, raw: &ParamsState) {
        let names: Vec<String> = self
            .formatter
            .search_format()
            .names()
            .filter(|name| raw.contains_key(name))
            .map(str::to_string)
            .collect();
        for name in names {
            let Some(spec) = self.formatter.search_format().get(&name) else {
                continue;
            };
            let value = self.formatter.coerce(&name, spec, &raw.get_all(&name));
            if let Some(spec) = self.formatter.format_mut().get_mut(&name) {
                tracing::debug!(field = %name, default = ?value, "default replaced");
                spec.default = value;
            }
        }
    }

    #[must_use]
    pub const fn formatter(&self) -> &SearchFormatter {
        &self.formatter
    }

    #[must_use]
    pub const fn search_format(&self) -> &SearchFormat {
        self.formatter.search_format()
    }

    #[must_use]
    pub fn defaults(&self) -> TypedParams {
        self.formatter.defaults()
    }

    /// Fields flagged `hidden`, in declaration order.
    #[must_use]
    pub fn hidden_keys(&self) -> Vec<&str> {
        self.keys_where(|spec| spec.hidden)
    }

    /// Fields flagged `locked`, in declaration order.
    #[must_use]
    pub fn locked_keys(&self) -> Vec<&str> {
        self.keys_where(|spec| spec.locked)
    }

    fn keys_where(&self, pred: impl Fn(&FieldSpec) -> bool) -> Vec<&str> {
        self.search_format()
            .iter()
            .filter(|&(_, spec)| pred(spec))
            .map(|(name, _)| name)
            .collect()
    }

    fn result(&self, params: ParamsState, values: TypedParams) -> SearchParams {
        SearchParams::new(params, values).with_defaults(self.defaults())
    }

    /// Typed values for `raw`.
    #[must_use]
    pub fn parse(&self, raw: &ParamsState) -> TypedParams {
        self.formatter.parse(raw)
    }

    /// Minimal encoding of `stored`.
    #[must_use]
    pub fn delta_params(&self, stored: &ParamsState) -> SearchParams {
        let values = self.formatter.parse(stored);
        let params = self.formatter.format(&values);
        self.result(params, values)
    }

    /// Complete encoding of `raw`: every declared field present.
    #[must_use]
    pub fn full_params(&self, raw: &ParamsState) -> SearchParams {
        let values = self.formatter.parse(raw);
        let params = self.formatter.format_full(&values);
        self.result(params, values)
    }

    /// Minimal encoding of already-typed values.
    #[must_use]
    pub fn from_object(&self, typed: &TypedParams) -> SearchParams {
        self.delta_params(&self.formatter.format(typed))
    }

    /// Complete encoding of already-typed values.
    #[must_use]
    pub fn full_object(&self, typed: &TypedParams) -> SearchParams {
        self.full_params(&self.formatter.format_full(typed))
    }

    /// Pick each field from `left`, `right`, or the default, then normalize.
    #[must_use]
    pub fn merge_params(
        &self,
        left: &ParamsState,
        right: &ParamsState,
        mut chooser: impl FnMut(&str) -> MergeSide,
    ) -> SearchParams {
        let mut merged = ParamsState::new();
        for name in self.formatter.search_format().names() {
            let source = match chooser(name) {
                MergeSide::Left => left,
                MergeSide::Right => right,
                MergeSide::Default => continue,
            };
            for value in source.get_all(name) {
                merged.append(name, value);
            }
        }
        self.delta_params(&merged)
    }

    /// Normalize `raw` and persist its delta under `key`.
    pub fn save_to(&self, store: &dyn ParamStore, key: &str, raw: &ParamsState) -> Result<SearchParams> {
        let delta = self.delta_params(raw);
        store.set(key, &delta.to_string())?;
        tracing::debug!(key, query = %delta, "saved search params");
        Ok(delta)
    }

    /// Normalized query stored under `key`. When nothing is stored the
    /// encoding is empty, even for enforced fields, and the values are the
    /// defaults.
    pub fn restore_from(&self, store: &dyn ParamStore, key: &str) -> Result<SearchParams> {
        Ok(match store.get(key)? {
            Some(stored) => self.delta_params(&ParamsState::parse(&stored)),
            None => self.result(ParamsState::new(), self.defaults()),
        })
    }

    /// Forget the query stored under `key`.
    pub fn clear(&self, store: &dyn ParamStore, key: &str) -> Result<bool> {
        store.remove(key)
    }

    /// Typed value of one field after normalizing `raw`.
    #[must_use]
    pub fn value_of(&self, raw: &ParamsState, name: &str) -> Option<FieldValue> {
        self.formatter.parse(raw).shift_remove(name)
    }
}
