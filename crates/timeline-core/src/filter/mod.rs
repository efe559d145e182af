//! The composite filter model (§3) and its compiler (§4.3).

mod compiler;

pub use compiler::{compile, CompiledFilter};

use serde::{Deserialize, Serialize};

/// Per-column substring filter: case-insensitive `LIKE %value%`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstringFilter {
    pub column: String,
    pub value: String,
}

/// Per-column checkbox-value set. The sentinel empty string matches NULL
/// or empty-string cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckboxFilter {
    pub column: String,
    pub values: Vec<String>,
}

impl CheckboxFilter {
    pub fn includes_null_sentinel(&self) -> bool {
        self.values.iter().any(|v| v.is_empty())
    }

    pub fn non_null_values(&self) -> Vec<&str> {
        self.values.iter().filter(|v| !v.is_empty()).map(|s| s.as_str()).collect()
    }
}

/// Per-column inclusive date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRangeFilter {
    pub column: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Tag filter variants (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagFilter {
    None,
    AnyTagged,
    Label(String),
    Labels(Vec<String>),
}

/// Advanced-filter operators (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancedOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    Regex,
}

/// AND/OR logic preceding an advanced-filter condition. The first
/// condition's logic is ignored; subsequent `And` conditions extend the
/// current group, `Or` starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLogic {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedCondition {
    pub column: String,
    pub operator: AdvancedOperator,
    pub value: Option<String>,
    pub logic: FilterLogic,
}

/// Search mode (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Mixed,
    And,
    Or,
    Exact,
    Regex,
}

/// Search condition (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCondition {
    Contains,
    Startswith,
    Like,
    Equals,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSearch {
    pub term: String,
    pub mode: SearchMode,
    pub condition: SearchCondition,
}

/// The full composite filter model (§3): every populated field is AND'd
/// together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterModel {
    pub substrings: Vec<SubstringFilter>,
    pub checkboxes: Vec<CheckboxFilter>,
    pub date_ranges: Vec<DateRangeFilter>,
    pub bookmarked_only: bool,
    pub tag_filter: Option<TagFilter>,
    pub advanced: Vec<AdvancedCondition>,
    pub search: Option<GlobalSearch>,
}
