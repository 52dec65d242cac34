// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Category Set and Channel Tags
// ─────────────────────────────────────────────────────────────────────
//! The closed category enumeration and the three channel tags.
//!
//! Declaration order is significant: arg-max ties resolve to the
//! category that appears first in [`Category::ALL`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// Number of categories.
pub const N_CATEGORIES: usize = 8;

/// Number of classifier channels.
pub const N_CHANNELS: usize = 3;

/// Intent categories. `Unknown` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Greeting,
    Help,
    Status,
    Navigation,
    Physics,
    Operator,
    Structure,
    Unknown,
}

impl Category {
    pub const ALL: [Category; N_CATEGORIES] = [
        Category::Greeting,
        Category::Help,
        Category::Status,
        Category::Navigation,
        Category::Physics,
        Category::Operator,
        Category::Structure,
        Category::Unknown,
    ];

    /// Position in the fixed enumeration order.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Greeting => "greeting",
            Category::Help => "help",
            Category::Status => "status",
            Category::Navigation => "navigation",
            Category::Physics => "physics",
            Category::Operator => "operator",
            Category::Structure => "structure",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name() == needle)
            .ok_or_else(|| TriageError::UnknownCategory(s.to_string()))
    }
}

/// The three reading styles applied to the same heated vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Channel A: needs strong signal to activate. Paired with the lexical head.
    Conservative,
    /// Channel B: balanced. Paired with the subspace head.
    Balanced,
    /// Channel C: activates on weak signal. Paired with the shape head.
    Liberal,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; N_CHANNELS] = [
        ChannelKind::Conservative,
        ChannelKind::Balanced,
        ChannelKind::Liberal,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Conservative => "conservative",
            ChannelKind::Balanced => "balanced",
            ChannelKind::Liberal => "liberal",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_order() {
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(Category::from_index(i), Some(*c));
        }
        assert_eq!(Category::from_index(N_CATEGORIES), None);
    }

    #[test]
    fn test_unknown_is_last() {
        assert_eq!(Category::ALL[N_CATEGORIES - 1], Category::Unknown);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("help".parse::<Category>().unwrap(), Category::Help);
        assert_eq!(" Physics ".parse::<Category>().unwrap(), Category::Physics);
        assert!(matches!(
            "weather".parse::<Category>(),
            Err(TriageError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Category::Navigation).unwrap();
        assert_eq!(json, "\"navigation\"");
        let kind: ChannelKind = serde_json::from_str("\"liberal\"").unwrap();
        assert_eq!(kind, ChannelKind::Liberal);
    }
}
