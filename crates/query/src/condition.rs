//! Query data model: conditions, display fields and the plan that ties them
//! to a sheet selection.

use serde::{Deserialize, Serialize};
use sheetquery_sheet::JoinType;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Sentinel display column meaning "show every column"
pub const SHOW_ALL: &str = "*";

/// Comparison applied by one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Between,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Contains => "contains",
            Operator::NotContains => "not contains",
            Operator::Equals => "equals",
            Operator::NotEquals => "not equals",
            Operator::Greater => "greater",
            Operator::Less => "less",
            Operator::GreaterOrEqual => "greater or equal",
            Operator::LessOrEqual => "less or equal",
            Operator::Between => "between",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Operator> {
        [
            Operator::Contains,
            Operator::NotContains,
            Operator::Equals,
            Operator::NotEquals,
            Operator::Greater,
            Operator::Less,
            Operator::GreaterOrEqual,
            Operator::LessOrEqual,
            Operator::Between,
            Operator::StartsWith,
            Operator::EndsWith,
            Operator::IsEmpty,
            Operator::IsNotEmpty,
        ]
        .iter()
        .copied()
    }

    /// `is empty` and `is not empty` ignore the condition value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown operator, logic or mode keyword
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseKeywordError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Operator {
    type Err = ParseKeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let op = match normalized.as_str() {
            "contains" => Operator::Contains,
            "not contains" | "!contains" => Operator::NotContains,
            "equals" | "=" | "==" => Operator::Equals,
            "not equals" | "!=" | "<>" => Operator::NotEquals,
            "greater" | "greater than" | ">" => Operator::Greater,
            "less" | "less than" | "<" => Operator::Less,
            "greater or equal" | ">=" => Operator::GreaterOrEqual,
            "less or equal" | "<=" => Operator::LessOrEqual,
            "between" => Operator::Between,
            "starts with" => Operator::StartsWith,
            "ends with" => Operator::EndsWith,
            "is empty" => Operator::IsEmpty,
            "is not empty" => Operator::IsNotEmpty,
            _ => {
                return Err(ParseKeywordError {
                    kind: "operator",
                    value: s.to_string(),
                })
            }
        };
        Ok(op)
    }
}

impl TryFrom<String> for Operator {
    type Error = ParseKeywordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// How a condition's mask joins the mask accumulated before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Logic {
    #[default]
    And,
    Or,
    AndNot,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
            Logic::AndNot => "AND NOT",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Logic {
    type Err = ParseKeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "AND" | "&&" => Ok(Logic::And),
            "OR" | "||" => Ok(Logic::Or),
            "AND NOT" => Ok(Logic::AndNot),
            _ => Err(ParseKeywordError {
                kind: "logic operator",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Logic {
    type Error = ParseKeywordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Logic> for String {
    fn from(logic: Logic) -> Self {
        logic.as_str().to_string()
    }
}

/// One filter: `column operator value`, chained to the previous condition
/// by `logic`. The first condition's logic is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
    /// Restricts the condition to one sheet (merge mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<String>,
}

impl Condition {
    pub fn new(column: &str, operator: Operator, value: &str) -> Self {
        Condition {
            column: column.to_string(),
            operator,
            value: value.to_string(),
            logic: None,
            applies_to: None,
        }
    }

    #[must_use]
    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = Some(logic);
        self
    }

    #[must_use]
    pub fn for_sheet(mut self, sheet: &str) -> Self {
        self.applies_to = Some(sheet.to_string());
        self
    }

    /// Logic used when folding; absent means AND
    pub fn logic_or_default(&self) -> Logic {
        self.logic.unwrap_or_default()
    }

    /// Conditions with a blank value are skipped, unless the operator
    /// takes no value.
    pub fn is_active(&self) -> bool {
        !self.column.trim().is_empty()
            && (!self.operator.takes_value() || !self.value.trim().is_empty())
    }

    /// Split a `sheet.column` or `sheet:column` reference when the prefix
    /// names one of `sheets`. Unknown prefixes leave the column untouched.
    pub fn qualify(&mut self, sheets: &[String]) {
        if self.applies_to.is_some() {
            return;
        }
        if let Some((sheet, column)) = split_qualified(&self.column, sheets) {
            self.applies_to = Some(sheet);
            self.column = column;
        }
    }

    /// `sheet.column` when qualified, otherwise the bare column
    pub fn qualified_column(&self) -> String {
        match &self.applies_to {
            Some(sheet) => format!("{sheet}.{}", self.column),
            None => self.column.clone(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator.takes_value() {
            write!(
                f,
                "{} {} \"{}\"",
                self.qualified_column(),
                self.operator,
                self.value
            )
        } else {
            write!(f, "{} {}", self.qualified_column(), self.operator)
        }
    }
}

/// Split `prefix.rest` / `prefix:rest` when `prefix` is one of `sheets`.
/// The longest matching sheet name wins, so sheet names may contain dots.
pub(crate) fn split_qualified(reference: &str, sheets: &[String]) -> Option<(String, String)> {
    sheets
        .iter()
        .filter(|sheet| {
            reference.len() > sheet.len() + 1
                && reference.starts_with(sheet.as_str())
                && matches!(reference.as_bytes()[sheet.len()], b'.' | b':')
        })
        .max_by_key(|sheet| sheet.len())
        .map(|sheet| (sheet.clone(), reference[sheet.len() + 1..].to_string()))
}

/// A column to show in the result, optionally under another label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayField {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DisplayField {
    pub fn new(column: &str) -> Self {
        DisplayField {
            column: column.to_string(),
            label: None,
        }
    }

    /// The "show all columns" field
    pub fn all() -> Self {
        Self::new(SHOW_ALL)
    }

    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        let label = label.trim();
        self.label = (!label.is_empty()).then(|| label.to_string());
        self
    }

    pub fn is_all(&self) -> bool {
        self.column.trim() == SHOW_ALL
    }
}

/// How the selected sheets are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Vertical union, each row tagged with its sheet
    #[default]
    Stack,
    /// Join on a shared key column
    Merge,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Stack => "stack",
            Mode::Merge => "merge",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseKeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stack" => Ok(Mode::Stack),
            "merge" | "join" => Ok(Mode::Merge),
            _ => Err(ParseKeywordError {
                kind: "mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Everything one query execution needs, passed by value into the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPlan {
    pub selected_sheets: Vec<String>,
    pub mode: Mode,
    pub conditions: Vec<Condition>,
    pub display_fields: Vec<DisplayField>,
    pub merge_key: Option<String>,
    /// Falls back to the configured default join when unset
    pub join_type: Option<JoinType>,
}

impl QueryPlan {
    pub fn new<S: AsRef<str>>(sheets: &[S]) -> Self {
        let mut plan = QueryPlan::default();
        for sheet in sheets {
            plan.select(sheet.as_ref());
        }
        plan
    }

    /// Read a plan from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Read a plan from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(std::io::Error::from)
    }

    /// Add a sheet to the selection; repeated names are ignored
    pub fn select(&mut self, sheet: &str) {
        if !self.selected_sheets.iter().any(|s| s == sheet) {
            self.selected_sheets.push(sheet.to_string());
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_display_field(mut self, field: DisplayField) -> Self {
        self.display_fields.push(field);
        self
    }

    #[must_use]
    pub fn with_merge_key(mut self, key: &str) -> Self {
        self.merge_key = Some(key.to_string());
        self
    }

    #[must_use]
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    /// Selected sheet names with duplicates removed, in selection order
    pub fn sheets(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for sheet in &self.selected_sheets {
            if !seen.contains(sheet) {
                seen.push(sheet.clone());
            }
        }
        seen
    }

    /// Conditions with sheet qualifiers split out against the selection
    pub fn qualified_conditions(&self) -> Vec<Condition> {
        let sheets = self.sheets();
        self.conditions
            .iter()
            .cloned()
            .map(|mut c| {
                c.qualify(&sheets);
                c
            })
            .collect()
    }
}
