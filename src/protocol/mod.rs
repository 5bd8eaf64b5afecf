//! Protocol lookup: diagnosis tokens to an ideal delivery GA.
//!
//! Tokens are normalized upstream; lookup is exact. When several tokens
//! match, the clinically most urgent (lowest ideal GA) protocol wins.
//!
//! # Algorithm
//!
//! Matching entries are ordered by `(ideal_ga_weeks, margin_days, token)`
//! and the first one is returned. No match yields the default entry.

mod catalog;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Rule family a protocol entry belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolCategory {
    /// Maternal condition.
    Maternal,
    /// Fetal condition.
    Fetal,
    /// Elective indication.
    Elective,
    /// Special procedure.
    Procedure,
    /// No specific protocol matched.
    #[default]
    Default,
}

impl fmt::Display for ProtocolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProtocolCategory::Maternal => "maternal",
            ProtocolCategory::Fetal => "fetal",
            ProtocolCategory::Elective => "elective",
            ProtocolCategory::Procedure => "procedure",
            ProtocolCategory::Default => "default",
        };
        f.write_str(label)
    }
}

/// One row of the protocol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    /// Normalized diagnosis/procedure token.
    pub token: String,
    /// Ideal delivery GA in weeks.
    pub ideal_ga_weeks: u32,
    /// Acceptable deviation in days.
    pub margin_days: u32,
    /// Rule family.
    #[serde(default)]
    pub category: ProtocolCategory,
}

impl ProtocolEntry {
    /// Creates an entry in the default category.
    pub fn new(token: impl Into<String>, ideal_ga_weeks: u32, margin_days: u32) -> Self {
        Self {
            token: token.into(),
            ideal_ga_weeks,
            margin_days,
            category: ProtocolCategory::Default,
        }
    }

    /// Sets the rule family.
    pub fn with_category(mut self, category: ProtocolCategory) -> Self {
        self.category = category;
        self
    }
}

/// Token reported when no protocol matched.
pub const DEFAULT_TOKEN: &str = "default";

/// The protocol selected for a set of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMatch {
    /// Matching token, or [`DEFAULT_TOKEN`].
    pub token: String,
    /// Ideal delivery GA in weeks.
    pub ideal_ga_weeks: u32,
    /// Acceptable deviation in days.
    pub margin_days: u32,
    /// Rule family.
    pub category: ProtocolCategory,
}

impl ProtocolMatch {
    /// Whether no specific protocol matched.
    pub fn is_default(&self) -> bool {
        self.category == ProtocolCategory::Default && self.token == DEFAULT_TOKEN
    }

    /// Ideal GA in days.
    pub fn ideal_ga_days(&self) -> i64 {
        i64::from(self.ideal_ga_weeks) * 7
    }
}

impl From<&ProtocolEntry> for ProtocolMatch {
    fn from(e: &ProtocolEntry) -> Self {
        Self {
            token: e.token.clone(),
            ideal_ga_weeks: e.ideal_ga_weeks,
            margin_days: e.margin_days,
            category: e.category,
        }
    }
}

/// Default ideal GA when nothing matches.
pub const DEFAULT_IDEAL_GA_WEEKS: u32 = 39;

/// Default margin when nothing matches.
pub const DEFAULT_MARGIN_DAYS: u32 = 7;

/// Immutable token → protocol table.
///
/// # Example
///
/// ```
/// use u_gestation::protocol::ProtocolTable;
///
/// let table = ProtocolTable::builtin();
/// let m = table.ideal_ga(["pre-eclampsia", "macrossomia"]);
/// assert_eq!(m.ideal_ga_weeks, 37);
/// assert_eq!(m.token, "pre-eclampsia");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolTable {
    entries: HashMap<String, ProtocolEntry>,
    default_ideal_ga_weeks: u32,
    default_margin_days: u32,
}

impl Default for ProtocolTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ProtocolTable {
    /// Creates a table. A later entry for the same token replaces an
    /// earlier one; see
    /// [`validate_protocol_entries`](crate::validation::validate_protocol_entries).
    pub fn new(entries: Vec<ProtocolEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.token.clone(), e)).collect(),
            default_ideal_ga_weeks: DEFAULT_IDEAL_GA_WEEKS,
            default_margin_days: DEFAULT_MARGIN_DAYS,
        }
    }

    /// The built-in clinical catalogue.
    pub fn builtin() -> Self {
        Self::new(catalog::builtin_entries())
    }

    /// Sets the result returned when nothing matches.
    pub fn with_defaults(mut self, ideal_ga_weeks: u32, margin_days: u32) -> Self {
        self.default_ideal_ga_weeks = ideal_ga_weeks;
        self.default_margin_days = margin_days;
        self
    }

    /// Looks up one token.
    pub fn get(&self, token: &str) -> Option<&ProtocolEntry> {
        self.entries.get(token)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by token.
    pub fn entries(&self) -> Vec<&ProtocolEntry> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| a.token.cmp(&b.token));
        all
    }

    /// The default match.
    pub fn default_match(&self) -> ProtocolMatch {
        ProtocolMatch {
            token: DEFAULT_TOKEN.to_string(),
            ideal_ga_weeks: self.default_ideal_ga_weeks,
            margin_days: self.default_margin_days,
            category: ProtocolCategory::Default,
        }
    }

    /// Every entry matching one of `tokens`, most urgent first.
    pub fn matches<I, S>(&self, tokens: I) -> Vec<&ProtocolEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found: Vec<&ProtocolEntry> = tokens
            .into_iter()
            .filter_map(|t| self.entries.get(t.as_ref()))
            .collect();
        found.sort_by(|a, b| {
            a.ideal_ga_weeks
                .cmp(&b.ideal_ga_weeks)
                .then(a.margin_days.cmp(&b.margin_days))
                .then_with(|| a.token.cmp(&b.token))
        });
        found.dedup_by(|a, b| a.token == b.token);
        found
    }

    /// The protocol governing a set of tokens.
    pub fn ideal_ga<I, S>(&self, tokens: I) -> ProtocolMatch
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.matches(tokens)
            .first()
            .map_or_else(|| self.default_match(), |e| ProtocolMatch::from(*e))
    }
}
