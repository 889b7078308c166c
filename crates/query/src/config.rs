use serde::{Deserialize, Serialize};
use sheetquery_sheet::JoinType;

/// Engine settings, read from the `[query]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Name of the injected column recording where each row came from
    pub provenance_column: String,
    /// Provenance value given to rows of a merged result
    pub merged_marker: String,
    /// Non-null values inspected when deciding whether a column holds dates
    pub date_sample_size: usize,
    /// Join used when the plan does not name one
    pub default_join: JoinType,
    /// Drop result rows whose data cells are all empty
    pub drop_empty_rows: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            provenance_column: "data source".to_string(),
            merged_marker: "merged data".to_string(),
            date_sample_size: 100,
            default_join: JoinType::Outer,
            drop_empty_rows: true,
        }
    }
}

impl QueryConfig {
    /// Sample size actually used; zero would classify nothing as a date
    pub fn effective_sample_size(&self) -> usize {
        self.date_sample_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: QueryConfig =
            serde_json::from_str(r#"{"provenance_column": "origin"}"#).unwrap();
        assert_eq!(config.provenance_column, "origin");
        assert_eq!(config.merged_marker, "merged data");
        assert_eq!(config.default_join, JoinType::Outer);
    }

    #[test]
    fn test_effective_sample_size() {
        let config = QueryConfig {
            date_sample_size: 0,
            ..QueryConfig::default()
        };
        assert_eq!(config.effective_sample_size(), 1);
    }
}
