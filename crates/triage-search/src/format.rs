//! Declared search formats.
//!
//! A [`SearchFormat`] maps field names to [`FieldSpec`]s in declaration order.
//! Formats are built once, either in code with the builder methods or from a
//! JSON document, and are immutable afterwards.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use triage_core::{Error, Result};

use crate::field::{FieldKind, FieldSpec, FieldValue};

/// Ordered field name → declaration map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchFormat {
    fields: IndexMap<String, FieldSpec>,
}

impl SearchFormat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Redeclaring a name replaces its spec in place.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Parse a JSON format document:
    /// `{"rows": {"kind": "number", "default": 25, "enforced": true}}`.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let defs: FieldDefs = serde_json::from_str(input).map_err(|e| {
            // Validation failures are raised as custom serde errors; surface
            // them as format errors rather than generic type errors.
            if e.is_data() {
                Error::invalid_format("<document>", e.to_string())
            } else {
                Error::Serialization(e)
            }
        })?;
        let mut fields = IndexMap::with_capacity(defs.0.len());
        for (name, def) in defs.0 {
            let spec = def.into_spec(&name)?;
            fields.insert(name, spec);
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut FieldSpec> {
        self.fields.get_mut(name)
    }

    pub(crate) fn specs_mut(&mut self) -> impl Iterator<Item = &mut FieldSpec> {
        self.fields.values_mut()
    }
}

/// Field definitions in document order, rejecting duplicate names.
struct FieldDefs(Vec<(String, FieldSpecDef)>);

impl<'de> Deserialize<'de> for FieldDefs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DefsVisitor;

        impl<'de> Visitor<'de> for DefsVisitor {
            type Value = FieldDefs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping field names to field definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FieldDefs, A::Error> {
                let mut out: Vec<(String, FieldSpecDef)> = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    if out.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!("duplicate field '{name}'")));
                    }
                    let def = map.next_value::<FieldSpecDef>()?;
                    out.push((name, def));
                }
                Ok(FieldDefs(out))
            }
        }

        deserializer.deserialize_map(DefsVisitor)
    }
}

/// Serialized shape of one field declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpecDef {
    kind: String,
    #[serde(default, deserialize_with = "present")]
    default: Option<Value>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    enforced: bool,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    nullable: bool,
}

/// `Some` whenever the key is present, so an explicit `null` survives.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl FieldSpecDef {
    fn into_spec(self, name: &str) -> Result<FieldSpec> {
        let kind = match self.kind.as_str() {
            "string" => FieldKind::String,
            "number" => FieldKind::Number,
            "boolean" => FieldKind::Boolean,
            "array" => FieldKind::Array,
            "enum" => {
                let options = self.options.clone().unwrap_or_default();
                if options.is_empty() {
                    return Err(Error::invalid_format(name, "enum fields need a non-empty 'options' list"));
                }
                FieldKind::Enum { options }
            }
            other => return Err(Error::invalid_format(name, format!("unknown kind '{other}'"))),
        };
        if self.options.is_some() && !matches!(kind, FieldKind::Enum { .. }) {
            return Err(Error::invalid_format(name, "'options' only applies to enum fields"));
        }
        if (self.min.is_some() || self.max.is_some()) && kind != FieldKind::Number {
            return Err(Error::invalid_format(name, "'min'/'max' only apply to number fields"));
        }
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(Error::invalid_format(name, format!("min {min} exceeds max {max}")));
        }
        if self.nullable && kind.is_array() {
            return Err(Error::invalid_format(name, "array fields cannot be nullable"));
        }

        let default = match self.default {
            None => zero_value(&kind),
            Some(raw) => {
                let value: FieldValue = serde_json::from_value(raw.clone()).map_err(|_| {
                    Error::invalid_format(name, format!("default {raw} is not a valid value"))
                })?;
                if !value.matches_kind(&kind) && !(self.nullable && value.is_null()) {
                    return Err(Error::invalid_format(
                        name,
                        format!("default {raw} does not match kind '{kind}'"),
                    ));
                }
                value
            }
        };
        if let (FieldKind::Enum { options }, FieldValue::Text(text)) = (&kind, &default)
            && !options.contains(text)
        {
            return Err(Error::invalid_format(
                name,
                format!("default '{text}' is not one of the options"),
            ));
        }

        let mut spec = FieldSpec {
            kind,
            default,
            min: None,
            max: None,
            enforced: self.enforced,
            locked: self.locked,
            hidden: self.hidden,
            nullable: self.nullable,
        };
        if let Some(min) = self.min {
            spec = spec.min(min);
        }
        if let Some(max) = self.max {
            spec = spec.max(max);
        }
        Ok(spec)
    }
}

/// Default used when a declaration omits one.
fn zero_value(kind: &FieldKind) -> FieldValue {
    match kind {
        FieldKind::String => FieldValue::Text(String::new()),
        FieldKind::Number => FieldValue::Number(0.0),
        FieldKind::Boolean => FieldValue::Bool(false),
        FieldKind::Array => FieldValue::List(Vec::new()),
        FieldKind::Enum { options } => {
            FieldValue::Text(options.first().cloned().unwrap_or_default())
        }
    }
}
