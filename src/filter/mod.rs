//! Admission filtering of qualified names.

pub mod composite;
pub mod rule;

pub use composite::CompositeFilter;
pub use rule::{MatchRule, RuleList, LITERAL_MARKER};
