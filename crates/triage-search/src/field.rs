//! Field declarations: the kind of each search parameter, its typed value,
//! and the per-field modifiers (default, clamps, enforced, locked, hidden,
//! nullable).

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Declared kind of a search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// Multi-valued filter list; repeated keys in the query string.
    Array,
    /// String restricted to a fixed option list.
    Enum { options: Vec<String> },
}

impl FieldKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Enum { .. } => "enum",
        }
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    /// Explicit absence; only valid for nullable scalar fields.
    Null,
}

impl FieldValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Query-string form of a scalar value; `None` for lists.
    #[must_use]
    pub fn to_param_string(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Text(s) => Some(s.clone()),
            Self::Null => Some("null".to_string()),
            Self::List(_) => None,
        }
    }

    /// Whether this value has the shape `kind` expects. `Null` never does;
    /// nullability is a property of the field, see [`FieldSpec::accepts`].
    #[must_use]
    pub const fn matches_kind(&self, kind: &FieldKind) -> bool {
        matches!(
            (self, kind),
            (Self::Bool(_), FieldKind::Boolean)
                | (Self::Number(_), FieldKind::Number)
                | (Self::Text(_), FieldKind::String | FieldKind::Enum { .. })
                | (Self::List(_), FieldKind::Array)
        )
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Null => serializer.serialize_unit(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Integral value of `n` when it can be printed without a fraction.
#[allow(clippy::cast_possible_truncation)] // bounded by the 2^53 check
fn integral(n: f64) -> Option<i64> {
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;
    (n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE).then_some(n as i64)
}

/// Render a number the way it appears in a query string (`25`, not `25.0`).
#[must_use]
pub fn format_number(n: f64) -> String {
    integral(n).map_or_else(|| n.to_string(), |i| i.to_string())
}

/// Declaration of one search parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub kind: FieldKind,
    pub default: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Always emitted when encoding, even at the default value.
    pub enforced: bool,
    /// Value always comes from the default; incoming values are ignored.
    pub locked: bool,
    /// Kept out of user-facing listings (see `SearchParser::hidden_keys`).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Scalar field that also accepts `null` (`key=null` in a query).
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
}

impl FieldSpec {
    fn with_kind(kind: FieldKind, default: FieldValue) -> Self {
        Self {
            kind,
            default,
            min: None,
            max: None,
            enforced: false,
            locked: false,
            hidden: false,
            nullable: false,
        }
    }

    #[must_use]
    pub fn string(default: impl Into<String>) -> Self {
        Self::with_kind(FieldKind::String, FieldValue::Text(default.into()))
    }

    #[must_use]
    pub fn number(default: f64) -> Self {
        Self::with_kind(FieldKind::Number, FieldValue::Number(default))
    }

    #[must_use]
    pub fn boolean(default: bool) -> Self {
        Self::with_kind(FieldKind::Boolean, FieldValue::Bool(default))
    }

    #[must_use]
    pub fn array<I, S>(default: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(
            FieldKind::Array,
            FieldValue::List(default.into_iter().map(Into::into).collect()),
        )
    }

    /// String restricted to `options`. A default outside the list is
    /// replaced by the first option.
    #[must_use]
    pub fn enumeration<I, S>(default: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        let mut default = default.into();
        if !options.contains(&default) {
            default = options.first().cloned().unwrap_or_default();
        }
        Self::with_kind(FieldKind::Enum { options }, FieldValue::Text(default))
    }

    #[must_use]
    pub const fn enforced(mut self) -> Self {
        self.enforced = true;
        self
    }

    #[must_use]
    pub const fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Allow `null` for scalar kinds. Array fields are never nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = !self.kind.is_array();
        self
    }

    /// Whether `value` is valid for this field: the right kind, or `Null`
    /// on a nullable field.
    #[must_use]
    pub const fn accepts(&self, value: &FieldValue) -> bool {
        value.matches_kind(&self.kind) || (self.nullable && value.is_null())
    }

    /// Lower clamp for number fields; the default is clamped too.
    #[must_use]
    pub fn min(mut self, value: f64) -> Self {
        self.min = Some(value);
        self.default = self.clamp_value(self.default.clone());
        self
    }

    /// Upper clamp for number fields; the default is clamped too.
    #[must_use]
    pub fn max(mut self, value: f64) -> Self {
        self.max = Some(value);
        self.default = self.clamp_value(self.default.clone());
        self
    }

    /// Clamp a number into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        let mut n = value;
        if let Some(min) = self.min {
            n = n.max(min);
        }
        if let Some(max) = self.max {
            n = n.min(max);
        }
        n
    }

    fn clamp_value(&self, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Number(n) => FieldValue::Number(self.clamp(n)),
            other => other,
        }
    }

    /// Whether `value` is an accepted option (always true for non-enums).
    #[must_use]
    pub fn accepts_option(&self, value: &str) -> bool {
        match &self.kind {
            FieldKind::Enum { options } => options.iter().any(|o| o == value),
            _ => true,
        }
    }
}
