//! Allow/block composite filter.

use tracing::{debug, info, warn};

use super::rule::{MatchRule, RuleList};
use crate::config::DepmapConfig;
use crate::error::DepmapError;

/// Decides whether a qualified name is admitted into the graph.
///
/// With neither list enabled everything is admitted. With one list enabled
/// that list alone decides. With both enabled, a name matched by exactly
/// one list follows that list; a name matched by both or by neither is
/// resolved by `prefer_allow`: when set the allow result wins, otherwise
/// the block result wins.
#[derive(Debug, Clone, Default)]
pub struct CompositeFilter {
    prefer_allow: bool,
    allows: RuleList,
    blocks: RuleList,
}

impl CompositeFilter {
    /// A filter with both lists empty and disabled, so it admits
    /// everything until rules are added.
    pub fn new(prefer_allow: bool) -> Self {
        Self {
            prefer_allow,
            ..Self::default()
        }
    }

    /// Build the filter from configuration. Rules that fail to compile are
    /// logged, skipped, and returned alongside the filter.
    pub fn from_config(config: &DepmapConfig) -> (Self, Vec<DepmapError>) {
        let mut filter = CompositeFilter::new(config.prefer_allow_over_block);
        let mut rejected = Vec::new();

        filter.clear_allows();
        if config.allow_rules_enabled() {
            filter.enable_allows();
            for rule in &config.allow_rules {
                info!("allow: \"{rule}\"");
                match MatchRule::parse(rule) {
                    Ok(rule) => filter.add_allow(rule),
                    Err(e) => {
                        warn!(error = %e, "allow rule rejected");
                        rejected.push(e);
                    }
                }
            }
        }

        filter.clear_blocks();
        if config.block_rules_enabled() {
            filter.enable_blocks();
            for rule in &config.block_rules {
                info!("block: \"{rule}\"");
                match MatchRule::parse(rule) {
                    Ok(rule) => filter.add_block(rule),
                    Err(e) => {
                        warn!(error = %e, "block rule rejected");
                        rejected.push(e);
                    }
                }
            }
        }

        (filter, rejected)
    }

    /// Which side wins when both lists, or neither, match.
    pub fn set_prefer_allow(&mut self, prefer_allow: bool) {
        self.prefer_allow = prefer_allow;
    }

    pub fn prefer_allow(&self) -> bool {
        self.prefer_allow
    }

    /// Drop every allow rule and disable the allow list.
    pub fn clear_allows(&mut self) {
        self.allows.clear();
    }

    /// Drop every block rule and disable the block list.
    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
    }

    /// Enable the allow list as it stands. Enabled and empty, it admits
    /// nothing unless the block list is enabled too.
    pub fn enable_allows(&mut self) {
        self.allows.set_enabled(true);
    }

    /// Enable the block list as it stands.
    pub fn enable_blocks(&mut self) {
        self.blocks.set_enabled(true);
    }

    /// Add an allow rule; enables allow filtering.
    pub fn add_allow(&mut self, rule: MatchRule) {
        self.allows.set_enabled(true);
        self.allows.push(rule);
    }

    /// Add a block rule; enables block filtering.
    pub fn add_block(&mut self, rule: MatchRule) {
        self.blocks.set_enabled(true);
        self.blocks.push(rule);
    }

    pub fn allows(&self) -> &RuleList {
        &self.allows
    }

    pub fn blocks(&self) -> &RuleList {
        &self.blocks
    }

    /// Whether `name` goes into the graph. Each decision is logged at
    /// debug level.
    pub fn admits(&self, name: &str) -> bool {
        let admitted = self.decide(name);
        if admitted {
            debug!(name, "admitted");
        } else {
            debug!(name, "blocked");
        }
        admitted
    }

    fn decide(&self, name: &str) -> bool {
        match (self.allows.is_enabled(), self.blocks.is_enabled()) {
            (false, false) => true,
            (true, false) => self.allows.any_match(name),
            (false, true) => !self.blocks.any_match(name),
            (true, true) => {
                if self.allows.is_empty() && self.blocks.is_empty() {
                    return true;
                }
                let allowed = self.allows.any_match(name);
                let blocked = self.blocks.any_match(name);
                match (allowed, blocked) {
                    (true, false) => true,
                    (false, true) => false,
                    _ if self.prefer_allow => allowed,
                    _ => !blocked,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(text: &str) -> MatchRule {
        MatchRule::parse(text).unwrap()
    }

    #[test]
    fn test_no_filtering_admits_everything() {
        let filter = CompositeFilter::new(false);
        for name in ["", "com.acme.Foo", "org.other.Bar", "x"] {
            assert!(filter.admits(name));
        }
    }

    #[test]
    fn test_allow_only() {
        let mut filter = CompositeFilter::new(false);
        filter.add_allow(rule("@com.acme."));
        assert!(filter.admits("com.acme.Foo"));
        assert!(!filter.admits("org.other.Bar"));
    }

    #[test]
    fn test_allow_enabled_with_empty_list_admits_nothing() {
        let mut filter = CompositeFilter::new(false);
        filter.enable_allows();
        assert!(!filter.admits("com.acme.Foo"));
    }

    #[test]
    fn test_block_only() {
        let mut filter = CompositeFilter::new(false);
        filter.add_block(rule(r"java\..*"));
        assert!(!filter.admits("java.lang.String"));
        assert!(filter.admits("com.acme.Foo"));
    }

    #[test]
    fn test_conflict_resolved_by_preference() {
        let mut filter = CompositeFilter::new(true);
        filter.add_allow(rule("@com.acme."));
        filter.add_block(rule(r"com\.acme\.internal\..*"));

        let name = "com.acme.internal.Secret";
        assert!(filter.admits(name));
        filter.set_prefer_allow(false);
        assert!(!filter.admits(name));

        // Only one side matches: no conflict, preference irrelevant.
        assert!(filter.admits("com.acme.Foo"));
    }

    #[test]
    fn test_neither_matched_with_both_enabled() {
        let mut filter = CompositeFilter::new(true);
        filter.add_allow(rule("@com.acme."));
        filter.add_block(rule("@java."));
        assert!(!filter.admits("org.other.Bar"));
        filter.set_prefer_allow(false);
        assert!(filter.admits("org.other.Bar"));
        assert!(!filter.admits("java.util.List"));
    }

    #[test]
    fn test_both_enabled_both_empty_admits_everything() {
        let mut filter = CompositeFilter::new(true);
        filter.enable_allows();
        filter.enable_blocks();
        assert!(filter.admits("anything"));
    }

    #[test]
    fn test_clear_disables_lists() {
        let mut filter = CompositeFilter::new(false);
        filter.add_allow(rule("@com.acme."));
        filter.clear_allows();
        assert!(filter.admits("org.other.Bar"));
    }

    #[test]
    fn test_from_config_skips_bad_rules() {
        let config = DepmapConfig {
            allow_rules: vec!["@com.acme.".to_string(), "com.(broken".to_string()],
            ..DepmapConfig::default()
        };
        let (filter, rejected) = CompositeFilter::from_config(&config);
        assert_eq!(rejected.len(), 1);
        assert_eq!(filter.allows().rules().len(), 1);
        assert!(filter.admits("com.acme.Foo"));
        assert!(!filter.admits("org.other.Bar"));
    }
}
