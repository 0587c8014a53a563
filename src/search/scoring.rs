//! Ranking policies for grouped results.
//!
//! Shard data carries no relevance score, so ranking is positional: by
//! default a shorter token is a closer match to the typed prefix.

use crate::types::GroupedResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How grouped results are ordered before truncation.
///
/// Every policy is applied with a stable sort over the token-ordered scan, so
/// results that compare equal keep first-seen order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Token length ascending, then display name ascending
    #[default]
    LengthThenName,
    /// Token order of the underlying scan
    TokenOrder,
}

impl RankingPolicy {
    pub fn compare(self, a: &GroupedResult, b: &GroupedResult) -> Ordering {
        match self {
            Self::LengthThenName => a
                .token
                .len()
                .cmp(&b.token.len())
                .then_with(|| a.display_name.cmp(&b.display_name)),
            Self::TokenOrder => Ordering::Equal,
        }
    }

    /// Sort `groups` in place according to this policy.
    pub fn rank(self, groups: &mut [GroupedResult]) {
        if self != Self::TokenOrder {
            groups.sort_by(|a, b| self.compare(a, b));
        }
    }
}
