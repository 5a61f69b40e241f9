//! Audit verdicts and the per-statement result aggregator.

use std::collections::HashSet;

use crate::i18n::I18nStr;
use crate::level::RuleLevel;

/// Message prefixes recognised as an existing severity tag.
///
/// `[osc]` is emitted by online-schema-change tooling and counts as already
/// tagged so rendering never double-prefixes it.
const LEVEL_TAGS: [&str; 5] = ["[error]", "[warn]", "[notice]", "[normal]", "[osc]"];

fn has_level_tag(message: &str) -> bool {
    LEVEL_TAGS.iter().any(|tag| message.starts_with(tag))
}

/// One rule's verdict for one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditResult {
    level: RuleLevel,
    rule_name: String,
    message: I18nStr,
}

impl AuditResult {
    /// Creates a verdict. An empty `rule_name` marks an anonymous finding.
    #[must_use]
    pub fn new(level: RuleLevel, rule_name: impl Into<String>, message: I18nStr) -> Self {
        Self {
            level,
            rule_name: rule_name.into(),
            message,
        }
    }

    /// Returns the severity of this finding.
    #[must_use]
    pub const fn level(&self) -> RuleLevel {
        self.level
    }

    /// Returns the name of the rule that fired, empty for anonymous findings.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    /// Returns the localised finding message.
    #[must_use]
    pub const fn message(&self) -> &I18nStr {
        &self.message
    }
}

/// All verdicts for one statement, kept sorted by descending severity.
///
/// Each rule contributes at most one finding: adding a result for a rule
/// name that already has one replaces it in place. Findings with an empty
/// level or an empty message are dropped, never appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditResults {
    results: Vec<AuditResult>,
}

impl AuditResults {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    /// Builds a collection from pre-made verdicts, dropping empty ones and
    /// establishing the severity ordering.
    #[must_use]
    pub fn from_results(results: impl IntoIterator<Item = AuditResult>) -> Self {
        let mut rs = Self::new();
        for r in results {
            rs.add(r.level, r.rule_name, r.message);
        }
        rs
    }

    /// Records a finding.
    ///
    /// A `Null` level or empty message is silently dropped. A non-empty
    /// `rule_name` that already has a finding updates that finding instead
    /// of appending. The collection is re-sorted by descending level after
    /// every mutation; the sort is stable, so equal levels keep insertion
    /// order.
    pub fn add(&mut self, level: RuleLevel, rule_name: impl Into<String>, message: I18nStr) {
        if level == RuleLevel::Null || message.is_empty() {
            return;
        }
        let rule_name = rule_name.into();

        if !rule_name.is_empty()
            && let Some(existing) = self.results.iter_mut().find(|r| r.rule_name == rule_name)
        {
            existing.level = level;
            existing.message = message;
        } else {
            self.results.push(AuditResult {
                level,
                rule_name,
                message,
            });
        }
        self.results.sort_by(|a, b| b.level.cmp(&a.level));
    }

    /// Returns the highest level among the findings, `Null` when empty.
    #[must_use]
    pub fn level(&self) -> RuleLevel {
        self.results
            .iter()
            .map(AuditResult::level)
            .max()
            .unwrap_or(RuleLevel::Null)
    }

    /// Returns `true` when at least one finding was recorded.
    #[must_use]
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    /// Returns the findings in descending severity order.
    #[must_use]
    pub fn results(&self) -> &[AuditResult] {
        &self.results
    }

    /// Renders the findings as one `[level]`-tagged line per finding.
    ///
    /// Findings with the same default-language message and level are
    /// reported once. Messages that already carry a recognised tag are
    /// emitted unchanged, so re-rendering a rendered message never
    /// double-prefixes.
    #[must_use]
    pub fn render_message(&self) -> String {
        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(self.results.len());
        for result in &self.results {
            let text = result.message.default_text();
            if !seen.insert(format!("{text}{}", result.level.as_str())) {
                continue;
            }
            if has_level_tag(text) {
                lines.push(text.to_owned());
            } else {
                lines.push(format!("[{}]{text}", result.level));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn msg(text: &str) -> I18nStr {
        I18nStr::from_default(text)
    }

    #[rstest]
    fn empty_level_or_message_is_dropped() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Null, "rule_a", msg("dropped"));
        rs.add(RuleLevel::Warn, "rule_b", I18nStr::new());
        assert!(!rs.has_results());
        assert_eq!(rs.level(), RuleLevel::Null);
    }

    #[rstest]
    fn results_sort_descending_by_level() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Notice, "rule_a", msg("notice finding"));
        rs.add(RuleLevel::Error, "rule_b", msg("error finding"));
        rs.add(RuleLevel::Warn, "rule_c", msg("warn finding"));

        let levels: Vec<RuleLevel> = rs.results().iter().map(AuditResult::level).collect();
        assert_eq!(levels, vec![RuleLevel::Error, RuleLevel::Warn, RuleLevel::Notice]);
        assert_eq!(rs.level(), RuleLevel::Error);
    }

    #[rstest]
    fn equal_levels_keep_insertion_order() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Warn, "first", msg("first finding"));
        rs.add(RuleLevel::Warn, "second", msg("second finding"));

        let names: Vec<&str> = rs.results().iter().map(AuditResult::rule_name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[rstest]
    fn named_rule_updates_in_place() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Warn, "rule_a", msg("old finding"));
        rs.add(RuleLevel::Error, "rule_a", msg("new finding"));

        assert_eq!(rs.results().len(), 1);
        let result = rs.results().first().expect("one result");
        assert_eq!(result.level(), RuleLevel::Error);
        assert_eq!(result.message().default_text(), "new finding");
    }

    #[rstest]
    fn anonymous_findings_accumulate() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Warn, "", msg("first"));
        rs.add(RuleLevel::Warn, "", msg("second"));
        assert_eq!(rs.results().len(), 2);
    }

    #[rstest]
    fn render_prefixes_untagged_messages() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Error, "rule_a", msg("select star is forbidden"));
        assert_eq!(rs.render_message(), "[error]select star is forbidden");
    }

    #[rstest]
    #[case("[error]already tagged")]
    #[case("[warn]already tagged")]
    #[case("[osc]online schema change hint")]
    fn render_is_idempotent_for_tagged_messages(#[case] tagged: &str) {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Error, "rule_a", msg(tagged));
        assert_eq!(rs.render_message(), tagged);
    }

    #[rstest]
    fn render_deduplicates_identical_findings() {
        let mut rs = AuditResults::new();
        rs.add(RuleLevel::Warn, "", msg("same text"));
        rs.add(RuleLevel::Warn, "", msg("same text"));
        rs.add(RuleLevel::Error, "", msg("same text"));

        // Same text at a different level is a distinct line.
        assert_eq!(rs.render_message(), "[error]same text\n[warn]same text");
    }

    #[rstest]
    fn from_results_normalises() {
        let rs = AuditResults::from_results([
            AuditResult::new(RuleLevel::Notice, "a", msg("n")),
            AuditResult::new(RuleLevel::Null, "b", msg("dropped")),
            AuditResult::new(RuleLevel::Error, "c", msg("e")),
        ]);
        assert_eq!(rs.results().len(), 2);
        assert_eq!(rs.level(), RuleLevel::Error);
    }
}
