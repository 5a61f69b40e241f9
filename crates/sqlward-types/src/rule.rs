//! Audit rule definitions.

use std::collections::BTreeMap;

use crate::i18n::{DEFAULT_LANG, I18nStr};
use crate::level::RuleLevel;
use crate::params::Params;

/// Localised descriptive fields of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleInfo {
    desc: String,
    annotation: String,
    category: String,
}

impl RuleInfo {
    /// Creates rule info with a description and category.
    #[must_use]
    pub fn new(desc: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            annotation: String::new(),
            category: category.into(),
        }
    }

    /// Attaches a longer explanatory annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    /// Returns the one-line description.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Returns the explanatory annotation.
    #[must_use]
    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Returns the display category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

/// One audit check declared by a plugin.
///
/// Rule names are unique within a plugin; the registry enforces this at
/// registration time. Descriptive fields are localised per language tag;
/// plugins speaking the flat V1 shapes get their strings lifted into
/// [`DEFAULT_LANG`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    name: String,
    level: RuleLevel,
    params: Params,
    info: BTreeMap<String, RuleInfo>,
}

impl Rule {
    /// Creates a rule with the given name and severity.
    #[must_use]
    pub fn new(name: impl Into<String>, level: RuleLevel) -> Self {
        Self {
            name: name.into(),
            level,
            params: Params::new(),
            info: BTreeMap::new(),
        }
    }

    /// Attaches configurable parameters.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Adds descriptive fields for a language.
    #[must_use]
    pub fn with_info(mut self, lang: impl Into<String>, info: RuleInfo) -> Self {
        self.info.insert(lang.into(), info);
        self
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the severity.
    #[must_use]
    pub const fn level(&self) -> RuleLevel {
        self.level
    }

    /// Returns the configurable parameters.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the descriptive fields for a language, if present.
    #[must_use]
    pub fn info(&self, lang: &str) -> Option<&RuleInfo> {
        self.info.get(lang)
    }

    /// Returns the default-language descriptive fields, if present.
    #[must_use]
    pub fn default_info(&self) -> Option<&RuleInfo> {
        self.info.get(DEFAULT_LANG)
    }

    /// Iterates over `(language, info)` pairs in tag order.
    pub fn info_by_lang(&self) -> impl Iterator<Item = (&str, &RuleInfo)> {
        self.info.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the localised description as an [`I18nStr`].
    #[must_use]
    pub fn desc(&self) -> I18nStr {
        self.info
            .iter()
            .map(|(lang, info)| (lang.clone(), info.desc.clone()))
            .collect()
    }
}
