//! Immutable result of a parser operation.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::field::FieldValue;
use crate::formatter::TypedParams;
use crate::params::ParamsState;

/// Encoded parameters together with the typed values they decode to.
///
/// `params` holds only what the encoding emitted (a delta, or the full view),
/// while `values` always carries every declared field. Results built by a
/// parser also remember the field defaults they were encoded against.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchParams {
    #[serde(rename = "query", serialize_with = "serialize_query")]
    params: ParamsState,
    values: TypedParams,
    #[serde(skip)]
    defaults: TypedParams,
}

fn serialize_query<S: Serializer>(params: &ParamsState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&params.to_query_string())
}

impl SearchParams {
    #[must_use]
    pub fn new(params: ParamsState, values: TypedParams) -> Self {
        Self {
            params,
            values,
            defaults: TypedParams::new(),
        }
    }

    /// Attach the defaults backing [`SearchParams::defaults`].
    #[must_use]
    pub fn with_defaults(mut self, defaults: TypedParams) -> Self {
        self.defaults = defaults;
        self
    }

    /// Result holding `values` verbatim: every non-null value is written
    /// out in field order, lists as repeated keys.
    #[must_use]
    pub fn from_values(values: TypedParams) -> Self {
        let mut params = ParamsState::new();
        for (name, value) in &values {
            match value {
                FieldValue::List(items) => {
                    for item in items {
                        params.append(name, item.clone());
                    }
                }
                FieldValue::Null => {}
                scalar => {
                    if let Some(text) = scalar.to_param_string() {
                        params.append(name, text);
                    }
                }
            }
        }
        Self::new(params, values)
    }

    /// Copy with `edit` applied to the values. The encoding is rebuilt
    /// verbatim from the edited values; run it through a parser to get a
    /// delta again.
    #[must_use]
    pub fn set(&self, edit: impl FnOnce(&mut TypedParams)) -> Self {
        let mut values = self.values.clone();
        edit(&mut values);
        Self::from_values(values).with_defaults(self.defaults.clone())
    }

    /// Result holding the default of every field.
    #[must_use]
    pub fn defaults(&self) -> Self {
        Self::from_values(self.defaults.clone()).with_defaults(self.defaults.clone())
    }

    #[must_use]
    pub const fn to_params(&self) -> &ParamsState {
        &self.params
    }

    #[must_use]
    pub const fn to_object(&self) -> &TypedParams {
        &self.values
    }

    #[must_use]
    pub fn into_parts(self) -> (ParamsState, TypedParams) {
        (self.params, self.values)
    }

    /// Typed value of a declared field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Whether the encoding carries `key`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Keep the fields for which `keep(name, value)` holds.
    #[must_use]
    pub fn filter(&self, mut keep: impl FnMut(&str, &FieldValue) -> bool) -> Self {
        self.split(|name, value| keep(name, value)).0
    }

    /// Partition into `(matching, rest)`.
    #[must_use]
    pub fn split(&self, mut pred: impl FnMut(&str, &FieldValue) -> bool) -> (Self, Self) {
        let mut matched = Self::default().with_defaults(self.defaults.clone());
        let mut rest = Self::default().with_defaults(self.defaults.clone());
        for (name, value) in &self.values {
            let target = if pred(name, value) { &mut matched } else { &mut rest };
            target.values.insert(name.clone(), value.clone());
        }
        for (name, value) in self.params.iter() {
            let target = if matched.values.contains_key(name) {
                &mut matched
            } else {
                &mut rest
            };
            target.params.append(name, value);
        }
        (matched, rest)
    }

    #[must_use]
    pub fn pick(&self, keys: &[&str]) -> Self {
        self.filter(|name, _| keys.contains(&name))
    }

    #[must_use]
    pub fn omit(&self, keys: &[&str]) -> Self {
        self.filter(|name, _| !keys.contains(&name))
    }
}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.params, f)
    }
}
