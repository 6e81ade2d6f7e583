// Coordination evidence shared between the matcher and the graph builder.

use serde::{Deserialize, Serialize};

/// An unordered pair of distinct accounts, stored smallest id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountPair {
    pub low: String,
    pub high: String,
}

impl AccountPair {
    /// `None` for a self-pair, which is never valid evidence.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self {
                low: a.to_string(),
                high: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                low: b.to_string(),
                high: a.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The member that isn't `account`, if `account` is in the pair.
    pub fn other(&self, account: &str) -> Option<&str> {
        if self.low == account {
            Some(&self.high)
        } else if self.high == account {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// Two accounts shared the same object within the time window.
///
/// Oriented so `account_a` is the earlier share; `time_delta_ms` is never
/// negative. One edge per qualifying pair of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationEdge {
    pub account_a: String,
    pub account_b: String,
    pub object_id: String,
    /// Post keys of the two shares (see `Event::post_key`).
    pub post_a: String,
    pub post_b: String,
    pub time_delta_ms: i64,
}

/// One account's post that took part in coordination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub account_id: String,
    pub post_id: String,
}

impl CoordinationEdge {
    /// The undirected key this edge aggregates under.
    ///
    /// `None` only for a self-edge, which the matcher never emits.
    pub fn pair(&self) -> Option<AccountPair> {
        AccountPair::new(&self.account_a, &self.account_b)
    }

    /// Both shares as account-attributed post references.
    pub fn posts(&self) -> [PostRef; 2] {
        [
            PostRef {
                account_id: self.account_a.clone(),
                post_id: self.post_a.clone(),
            },
            PostRef {
                account_id: self.account_b.clone(),
                post_id: self.post_b.clone(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_unordered() {
        assert_eq!(AccountPair::new("b", "a"), AccountPair::new("a", "b"));
        assert!(AccountPair::new("a", "a").is_none());
    }

    #[test]
    fn test_other() {
        let pair = AccountPair::new("x", "y").unwrap();
        assert_eq!(pair.other("x"), Some("y"));
        assert_eq!(pair.other("z"), None);
    }
}
