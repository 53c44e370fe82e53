//! Feed identity: the `(category, name)` pair every other component keys on.

use std::fmt;

/// Enumerated domain a feed belongs to.
///
/// Mirrors the categories the oracle votes on. `Other` exists so the
/// aggregator can carry feeds from configuration without rejecting them
/// at parse time (see `ftso-market-orchestrator`'s feed-mapping phase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeedCategory {
    Crypto,
    Forex,
    Commodity,
    Stock,
    Other,
}

impl fmt::Display for FeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedCategory::Crypto => "Crypto",
            FeedCategory::Forex => "Forex",
            FeedCategory::Commodity => "Commodity",
            FeedCategory::Stock => "Stock",
            FeedCategory::Other => "Other",
        };
        f.write_str(s)
    }
}

/// A feed is identified by `(category, name)`. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedId {
    pub category: FeedCategory,
    pub name: String,
}

impl FeedId {
    pub fn new(category: FeedCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Stable string encoding used as the cache-map key prefix: `category:name`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.category, self.name)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
