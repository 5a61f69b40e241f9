//! Rule severity levels and their total order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity attached to an audit rule or finding.
///
/// Levels form a total order used for ranking and thresholds:
/// `Null < Normal < Notice < Warn < Error`. `Null` denotes the absence of
/// findings rather than a real severity; its string form is empty.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    /// No finding.
    #[default]
    #[serde(rename = "")]
    Null,
    /// Advisory finding; does not block anything.
    Normal,
    /// Noteworthy finding.
    Notice,
    /// Finding that should be reviewed before execution.
    Warn,
    /// Finding that blocks execution.
    Error,
}

impl RuleLevel {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "",
            Self::Normal => "normal",
            Self::Notice => "notice",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RuleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRuleLevelError(String);

impl fmt::Display for ParseRuleLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rule level '{}'", self.0)
    }
}

impl std::error::Error for ParseRuleLevelError {}

impl FromStr for RuleLevel {
    type Err = ParseRuleLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Null),
            "normal" => Ok(Self::Normal),
            "notice" => Ok(Self::Notice),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ParseRuleLevelError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const ALL: [RuleLevel; 5] = [
        RuleLevel::Null,
        RuleLevel::Normal,
        RuleLevel::Notice,
        RuleLevel::Warn,
        RuleLevel::Error,
    ];

    #[rstest]
    fn ranking_matches_declaration_order() {
        for window in ALL.windows(2) {
            let [lower, higher] = window else {
                panic!("windows(2) yields pairs");
            };
            assert!(lower < higher, "{lower:?} must rank below {higher:?}");
        }
    }

    #[rstest]
    fn order_is_total() {
        for a in ALL {
            for b in ALL {
                let le = a <= b;
                let gt = a > b;
                assert!(le != gt, "exactly one of <= and > must hold for {a:?}/{b:?}");
            }
        }
    }

    #[rstest]
    #[case(RuleLevel::Null, "")]
    #[case(RuleLevel::Normal, "normal")]
    #[case(RuleLevel::Notice, "notice")]
    #[case(RuleLevel::Warn, "warn")]
    #[case(RuleLevel::Error, "error")]
    fn string_form_round_trips(#[case] level: RuleLevel, #[case] text: &str) {
        assert_eq!(level.as_str(), text);
        assert_eq!(text.parse::<RuleLevel>().expect("parse"), level);
    }

    #[rstest]
    fn unknown_level_is_rejected() {
        let err = "fatal".parse::<RuleLevel>().expect_err("must fail");
        assert!(err.to_string().contains("fatal"));
    }

    #[rstest]
    fn serde_uses_empty_string_for_null() {
        let json = serde_json::to_string(&RuleLevel::Null).expect("serialize");
        assert_eq!(json, r#""""#);
        let level: RuleLevel = serde_json::from_str(r#""warn""#).expect("deserialize");
        assert_eq!(level, RuleLevel::Warn);
    }
}
