//! Single allow/block rules over qualified names.

use regex::Regex;
use std::fmt;

use crate::error::{DepmapError, Result};

/// Marker that turns rule text into a literal prefix test.
pub const LITERAL_MARKER: char = '@';

/// A predicate over a qualified name.
#[derive(Debug, Clone)]
pub enum MatchRule {
    /// Matches the literal exactly or as a prefix.
    Prefix(String),
    /// Matches when the whole name matches the pattern.
    Pattern { source: String, regex: Regex },
}

impl MatchRule {
    /// Build a rule from its configured text.
    ///
    /// `@com.acme.` is a literal prefix; anything else is a regular
    /// expression that must match the entire name.
    pub fn parse(text: &str) -> Result<Self> {
        if let Some(literal) = text.strip_prefix(LITERAL_MARKER) {
            return Ok(MatchRule::Prefix(literal.to_string()));
        }
        Self::pattern(text)
    }

    /// Rule matching names that start with `literal`.
    pub fn prefix(literal: impl Into<String>) -> Self {
        MatchRule::Prefix(literal.into())
    }

    /// Rule matching names that `source` matches in full.
    pub fn pattern(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| DepmapError::InvalidRule {
            rule: source.to_string(),
            source: e,
        })?;
        Ok(MatchRule::Pattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            MatchRule::Prefix(literal) => name.starts_with(literal.as_str()),
            MatchRule::Pattern { regex, .. } => regex.is_match(name),
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Prefix(literal) => write!(f, "{LITERAL_MARKER}{literal}"),
            MatchRule::Pattern { source, .. } => f.write_str(source),
        }
    }
}

/// An ordered list of rules plus whether the list takes part in filtering.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    enabled: bool,
    rules: Vec<MatchRule>,
}

impl RuleList {
    /// An empty, disabled list.
    pub fn new() -> Self {
        Self::default()
    }

    /// An enabled list holding `rules`.
    pub fn enabled(rules: Vec<MatchRule>) -> Self {
        Self {
            enabled: true,
            rules,
        }
    }

    /// Turn the list on or off without touching its rules.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append `rule`. Enabling is left to the caller.
    pub fn push(&mut self, rule: MatchRule) {
        self.rules.push(rule);
    }

    /// Drop all rules and disable the list.
    pub fn clear(&mut self) {
        self.rules.clear();
        self.enabled = false;
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `name`, in list order.
    pub fn find(&self, name: &str) -> Option<&MatchRule> {
        self.rules.iter().find(|r| r.matches(name))
    }

    pub fn any_match(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_rule_is_exact_or_prefix() {
        let rule = MatchRule::parse("@com.acme.").unwrap();
        assert!(matches!(rule, MatchRule::Prefix(_)));
        assert!(rule.matches("com.acme."));
        assert!(rule.matches("com.acme.Foo"));
        assert!(!rule.matches("org.com.acme.Foo"));
        assert_eq!(rule.to_string(), "@com.acme.");
    }

    #[test]
    fn test_regex_rule_matches_full_name() {
        let rule = MatchRule::parse(r"com\.dnw\..*").unwrap();
        assert!(rule.matches("com.dnw.depmap.Activator"));
        assert!(!rule.matches("x.com.dnw.Foo"));

        let rule = MatchRule::parse("java.lang.Object").unwrap();
        assert!(rule.matches("java.lang.Object"));
        assert!(!rule.matches("java.lang.Object.toString"));
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        let err = MatchRule::parse("com.(acme").unwrap_err();
        assert!(matches!(err, DepmapError::InvalidRule { ref rule, .. } if rule == "com.(acme"));
    }

    #[test]
    fn test_rule_list_order_and_clear() {
        let mut list = RuleList::enabled(vec![MatchRule::prefix("a."), MatchRule::prefix("a.b")]);
        assert_eq!(list.find("a.b.C").unwrap().to_string(), "@a.");
        assert!(!list.any_match("b.a"));
        list.clear();
        assert!(list.is_empty());
        assert!(!list.is_enabled());
    }
}
