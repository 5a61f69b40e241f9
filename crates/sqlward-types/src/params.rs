//! Typed key/value parameter lists.
//!
//! Rules and connection descriptors carry open-ended parameter lists: a
//! rule's configurable threshold, a driver's extra connection knobs. Values
//! travel as strings on the wire; [`ParamKind`] records how a value should
//! be interpreted.

use serde::{Deserialize, Serialize};

use crate::i18n::I18nStr;

/// Interpretation of a parameter value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Free-form text.
    #[default]
    String,
    /// Base-10 integer.
    Int,
    /// `"true"` / `"false"`.
    Bool,
}

/// One named parameter with a localised description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    key: String,
    value: String,
    #[serde(default)]
    desc: I18nStr,
    #[serde(default)]
    kind: ParamKind,
}

impl Param {
    /// Creates a parameter with the given key, value, and kind.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            desc: I18nStr::new(),
            kind,
        }
    }

    /// Attaches a localised description.
    #[must_use]
    pub fn with_desc(mut self, desc: I18nStr) -> Self {
        self.desc = desc;
        self
    }

    /// Returns the parameter key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the raw string value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the localised description.
    #[must_use]
    pub const fn desc(&self) -> &I18nStr {
        &self.desc
    }

    /// Returns the value interpretation.
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Parses the value as an integer, if it is one.
    #[must_use]
    pub fn value_int(&self) -> Option<i64> {
        self.value.parse().ok()
    }

    /// Parses the value as a boolean, if it is one.
    #[must_use]
    pub fn value_bool(&self) -> Option<bool> {
        self.value.parse().ok()
    }
}

/// An ordered parameter list with key lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Vec<Param>);

impl Params {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a parameter.
    pub fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    /// Returns the parameter with the given key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.0.iter().find(|p| p.key == key)
    }

    /// Returns the raw value for a key, if present.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.get(key).map(Param::value)
    }

    /// Parses the value for a key as an integer, if present and numeric.
    #[must_use]
    pub fn int_of(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Param::value_int)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the list holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }
}

impl FromIterator<Param> for Params {
    fn from_iter<T: IntoIterator<Item = Param>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Params {
    type Item = Param;
    type IntoIter = std::vec::IntoIter<Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
