//! Localised text keyed by language tag.
//!
//! V2 plugins may ship rule descriptions and audit messages in several
//! languages; V1 plugins ship plain strings which are lifted into the
//! designated default language. [`DEFAULT_LANG`] is the key every plugin
//! must populate and the one used whenever a single rendering language is
//! needed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Language tag of the designated default locale.
pub const DEFAULT_LANG: &str = "en";

/// Localised text keyed by language tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct I18nStr(BTreeMap<String, String>);

impl I18nStr {
    /// Creates an empty localised string.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Lifts a non-localised string into the default language.
    #[must_use]
    pub fn from_default(text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_LANG.to_owned(), text.into());
        Self(map)
    }

    /// Adds or replaces the text for a language, returning `self`.
    #[must_use]
    pub fn with(mut self, lang: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(lang, text);
        self
    }

    /// Adds or replaces the text for a language.
    pub fn insert(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        self.0.insert(lang.into(), text.into());
    }

    /// Returns the text for a language, if present.
    #[must_use]
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0.get(lang).map(String::as_str)
    }

    /// Returns the default-language text, or the empty string when absent.
    #[must_use]
    pub fn default_text(&self) -> &str {
        self.get(DEFAULT_LANG).unwrap_or("")
    }

    /// Returns `true` when no language carries any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(language, text)` pairs in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for I18nStr {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn from_default_populates_default_lang() {
        let s = I18nStr::from_default("select is discouraged");
        assert_eq!(s.default_text(), "select is discouraged");
        assert_eq!(s.get(DEFAULT_LANG), Some("select is discouraged"));
    }

    #[rstest]
    fn default_text_is_empty_when_absent() {
        let s = I18nStr::new().with("zh", "仅中文");
        assert_eq!(s.default_text(), "");
        assert!(!s.is_empty());
    }

    #[rstest]
    fn iter_yields_tag_order() {
        let s = I18nStr::from_default("en text").with("de", "de text");
        let langs: Vec<&str> = s.iter().map(|(lang, _)| lang).collect();
        assert_eq!(langs, vec!["de", "en"]);
    }
}
