use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::sheet::Sheet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// How unmatched rows are treated when joining two sheets on a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Only rows whose key appears on both sides
    Inner,
    /// Every left row; unmatched ones get nulls on the right
    Left,
    /// Every row from both sides
    #[default]
    Outer,
}

impl JoinType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Outer => "outer",
        }
    }

    /// Whether rows without a match on the left side survive
    #[must_use]
    pub fn keeps_unmatched_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Outer)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinType {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "outer" | "full" => Ok(JoinType::Outer),
            other => Err(SheetError::Parse(format!("unknown join type: {other}"))),
        }
    }
}

impl Sheet {
    /// Join `other` onto this sheet by the shared key column.
    ///
    /// The key appears once, at its left position. Remaining right columns
    /// follow the left ones; a name already taken gets a `_right` suffix.
    /// Null keys never match.
    pub fn join(&self, other: &Sheet, key: &str, join_type: JoinType) -> Result<Sheet> {
        let left_key_idx = self
            .column_index(key)
            .ok_or_else(|| SheetError::JoinKeyNotFound {
                key: key.to_string(),
                sheet: self.name().to_string(),
            })?;
        let right_key_idx = other
            .column_index(key)
            .ok_or_else(|| SheetError::JoinKeyNotFound {
                key: key.to_string(),
                sheet: other.name().to_string(),
            })?;

        let mut right_map: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in other.rows().enumerate() {
            if let Some(key_val) = row[right_key_idx].join_key() {
                right_map.entry(key_val).or_default().push(i);
            }
        }

        // Result columns: left columns + right columns except key
        let mut result_names: Vec<String> = self.column_names().to_vec();
        let right_cols_to_add: Vec<(usize, String)> = other
            .column_names()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != right_key_idx)
            .map(|(i, name)| {
                let final_name = if result_names.contains(name) {
                    format!("{name}_right")
                } else {
                    name.clone()
                };
                (i, final_name)
            })
            .collect();
        result_names.extend(right_cols_to_add.iter().map(|(_, n)| n.clone()));

        let mut result = Sheet::with_columns(self.name(), result_names)?;
        let left_col_count = self.col_count();
        let mut matched_right: HashSet<usize> = HashSet::new();

        for left_row in self.rows() {
            let matches = left_row[left_key_idx]
                .join_key()
                .and_then(|k| right_map.get(&k));

            if let Some(right_indices) = matches {
                for &right_idx in right_indices {
                    matched_right.insert(right_idx);
                    let right_row = &other.data()[right_idx];
                    let mut new_row = left_row.clone();
                    new_row.extend(right_cols_to_add.iter().map(|(c, _)| right_row[*c].clone()));
                    result.push_raw_row(new_row);
                }
            } else if join_type.keeps_unmatched_left() {
                let mut new_row = left_row.clone();
                new_row.resize(left_col_count + right_cols_to_add.len(), CellValue::Null);
                result.push_raw_row(new_row);
            }
        }

        if join_type == JoinType::Outer {
            for (i, right_row) in other.rows().enumerate() {
                if matched_right.contains(&i) {
                    continue;
                }
                let mut new_row = vec![CellValue::Null; left_col_count];
                new_row[left_key_idx] = right_row[right_key_idx].clone();
                new_row.extend(right_cols_to_add.iter().map(|(c, _)| right_row[*c].clone()));
                result.push_raw_row(new_row);
            }
        }

        Ok(result)
    }
}
