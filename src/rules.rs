// purpose-atlas/src/rules.rs
//! Formatting rules every summary must satisfy.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRules {
    pub ascii_only: bool,
    pub no_commas: bool,
    pub max_length: usize,
}

impl Default for SummaryRules {
    fn default() -> Self {
        Self { ascii_only: true, no_commas: true, max_length: 140 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleViolation {
    Empty,
    Comma,
    NonAscii,
    TooLong { len: usize, max: usize },
}

impl RuleViolation {
    /// Short rule name used in lint output.
    pub fn rule(&self) -> &'static str {
        match self {
            RuleViolation::Empty => "summary-empty",
            RuleViolation::Comma => "summary-comma",
            RuleViolation::NonAscii => "summary-non-ascii",
            RuleViolation::TooLong { .. } => "summary-too-long",
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::Empty => f.write_str("summary is empty"),
            RuleViolation::Comma => f.write_str("summary contains a comma"),
            RuleViolation::NonAscii => f.write_str("summary contains non-ASCII characters"),
            RuleViolation::TooLong { len, max } => write!(f, "summary is {len} characters (limit {max})"),
        }
    }
}

/// All violations for one summary, in a fixed order.
pub fn validate_summary(summary: &str, rules: &SummaryRules) -> Vec<RuleViolation> {
    let mut out = Vec::new();
    if summary.trim().is_empty() {
        out.push(RuleViolation::Empty);
        return out;
    }
    if rules.no_commas && summary.contains(',') {
        out.push(RuleViolation::Comma);
    }
    if rules.ascii_only && !summary.is_ascii() {
        out.push(RuleViolation::NonAscii);
    }
    let len = summary.chars().count();
    if len > rules.max_length {
        out.push(RuleViolation::TooLong { len, max: rules.max_length });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_summary_passes() {
        assert!(validate_summary("Loads config from disk.", &SummaryRules::default()).is_empty());
    }

    #[test]
    fn collects_every_violation() {
        let rules = SummaryRules { max_length: 5, ..SummaryRules::default() };
        let v = validate_summary("Café, bar", &rules);
        assert_eq!(
            v,
            vec![RuleViolation::Comma, RuleViolation::NonAscii, RuleViolation::TooLong { len: 9, max: 5 }]
        );
    }

    #[test]
    fn toggles_are_respected() {
        let rules = SummaryRules { ascii_only: false, no_commas: false, max_length: 140 };
        assert!(validate_summary("Café, bar", &rules).is_empty());
    }

    #[test]
    fn empty_short_circuits() {
        assert_eq!(validate_summary("   ", &SummaryRules::default()), vec![RuleViolation::Empty]);
    }

    #[test]
    fn length_counts_characters() {
        let rules = SummaryRules { ascii_only: false, no_commas: true, max_length: 4 };
        assert!(validate_summary("éééé", &rules).is_empty());
    }
}
