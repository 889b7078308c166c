//! Evaluate one `(column, operator, value)` condition against a sheet.

use crate::classify::{cell_datetime, classify, parse_datetime, ColumnKind};
use crate::condition::Operator;
use sheetquery_sheet::{parse_number, CellValue, RowMask, Sheet, SheetError};
use std::cmp::Ordering;
use thiserror::Error;

/// Default number of values sampled when looking for date columns
pub const DEFAULT_DATE_SAMPLE: usize = 100;

/// A condition that cannot be evaluated as written
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("invalid range on '{column}': minimum {min} is greater than maximum {max}")]
    InvalidRange {
        column: String,
        min: String,
        max: String,
    },

    #[error("'between' on '{column}' needs two comma-separated values, got \"{value}\"")]
    MalformedBetween { column: String, value: String },

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// Produces one boolean per row for a single condition
#[derive(Debug, Clone, Copy)]
pub struct ConditionEvaluator {
    date_sample_size: usize,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_SAMPLE)
    }
}

impl ConditionEvaluator {
    pub fn new(date_sample_size: usize) -> Self {
        ConditionEvaluator {
            date_sample_size: date_sample_size.max(1),
        }
    }

    /// Evaluate `column operator value` on every row of `sheet`.
    ///
    /// A column missing from the sheet yields an all-false mask; surfacing
    /// that is up to the caller. Null cells never match positive tests and
    /// always match `not contains` / `not equals`.
    pub fn evaluate(
        &self,
        sheet: &Sheet,
        column: &str,
        operator: Operator,
        value: &str,
    ) -> Result<RowMask, EvalError> {
        if !sheet.has_column(column) {
            return Ok(RowMask::none(sheet.row_count()));
        }
        let cells: Vec<&CellValue> = sheet.column_values(column)?.collect();

        let mask = match operator {
            Operator::Contains => text_mask(&cells, value, |cell, needle| cell.contains(needle)),
            Operator::NotContains => {
                text_mask(&cells, value, |cell, needle| cell.contains(needle)).invert()
            }
            Operator::StartsWith => {
                text_mask(&cells, value, |cell, needle| cell.starts_with(needle))
            }
            Operator::EndsWith => text_mask(&cells, value, |cell, needle| cell.ends_with(needle)),
            Operator::IsEmpty => mask_of(&cells, CellValue::is_blank),
            Operator::IsNotEmpty => mask_of(&cells, |c| !c.is_blank()),
            typed => {
                let kind = classify(cells.iter().copied(), self.date_sample_size);
                tracing::trace!(column, ?kind, operator = %typed, "classified column");
                typed_mask(&cells, kind, column, typed, value)?
            }
        };

        debug_assert_eq!(mask.len(), sheet.row_count());
        Ok(mask)
    }
}

/// Evaluate with the default date sample size
pub fn evaluate(
    sheet: &Sheet,
    column: &str,
    operator: Operator,
    value: &str,
) -> Result<RowMask, EvalError> {
    ConditionEvaluator::default().evaluate(sheet, column, operator, value)
}

fn mask_of<F>(cells: &[&CellValue], predicate: F) -> RowMask
where
    F: Fn(&CellValue) -> bool,
{
    cells.iter().map(|c| predicate(*c)).collect()
}

/// Case-insensitive test on the string form; null never matches
fn text_mask<F>(cells: &[&CellValue], value: &str, test: F) -> RowMask
where
    F: Fn(&str, &str) -> bool,
{
    let needle = value.trim().to_lowercase();
    mask_of(cells, |cell| {
        !cell.is_null() && test(cell.as_str().to_lowercase().as_str(), needle.as_str())
    })
}

fn typed_mask(
    cells: &[&CellValue],
    kind: ColumnKind,
    column: &str,
    operator: Operator,
    value: &str,
) -> Result<RowMask, EvalError> {
    match operator {
        Operator::Equals => Ok(equals_mask(cells, kind, value)),
        Operator::NotEquals => Ok(equals_mask(cells, kind, value).invert()),
        Operator::Between => between_mask(cells, kind, column, value),
        ordered => Ok(ordered_mask(cells, kind, ordered, value)),
    }
}

fn equals_mask(cells: &[&CellValue], kind: ColumnKind, value: &str) -> RowMask {
    let value = value.trim();
    match kind {
        ColumnKind::DateTime { format } => {
            if let Some(target) = parse_datetime(value) {
                return mask_of(cells, |cell| {
                    cell_datetime(cell, format).is_some_and(|dt| dt.date() == target.date())
                });
            }
        }
        ColumnKind::Numeric => {
            if let Some(target) = parse_number(value) {
                return mask_of(cells, |cell| cell.as_float() == Some(target));
            }
        }
        ColumnKind::Text => {}
    }
    mask_of(cells, |cell| !cell.is_null() && cell.as_str().trim() == value)
}

/// Whether an ordering satisfies an ordered operator
fn accepts(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::Greater => ordering == Ordering::Greater,
        Operator::Less => ordering == Ordering::Less,
        Operator::GreaterOrEqual => ordering != Ordering::Less,
        Operator::LessOrEqual => ordering != Ordering::Greater,
        _ => false,
    }
}

fn ordered_mask(cells: &[&CellValue], kind: ColumnKind, operator: Operator, value: &str) -> RowMask {
    let value = value.trim();
    match kind {
        ColumnKind::DateTime { format } => {
            if let Some(target) = parse_datetime(value) {
                return mask_of(cells, |cell| {
                    cell_datetime(cell, format).is_some_and(|dt| accepts(operator, dt.cmp(&target)))
                });
            }
        }
        ColumnKind::Numeric => {
            if let Some(target) = parse_number(value) {
                return mask_of(cells, |cell| {
                    cell.as_float()
                        .and_then(|x| x.partial_cmp(&target))
                        .is_some_and(|o| accepts(operator, o))
                });
            }
        }
        ColumnKind::Text => {}
    }
    mask_of(cells, |cell| {
        !cell.is_null() && accepts(operator, cell.as_str().trim().cmp(value))
    })
}

fn between_mask(
    cells: &[&CellValue],
    kind: ColumnKind,
    column: &str,
    value: &str,
) -> Result<RowMask, EvalError> {
    let (min, max) = split_range(column, value)?;

    match kind {
        ColumnKind::Numeric => {
            if let (Some(lo), Some(hi)) = (parse_number(min), parse_number(max)) {
                if lo > hi {
                    return Err(EvalError::InvalidRange {
                        column: column.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                return Ok(mask_of(cells, |cell| {
                    cell.as_float().is_some_and(|x| lo <= x && x <= hi)
                }));
            }
        }
        ColumnKind::DateTime { format } => {
            if let (Some(lo), Some(hi)) = (parse_datetime(min), parse_datetime(max)) {
                return Ok(mask_of(cells, |cell| {
                    cell_datetime(cell, format).is_some_and(|dt| lo <= dt && dt <= hi)
                }));
            }
        }
        ColumnKind::Text => {}
    }

    Ok(mask_of(cells, |cell| {
        if cell.is_null() {
            return false;
        }
        let text = cell.as_str();
        let text = text.trim();
        min <= text && text <= max
    }))
}

/// Split `"min,max"` into trimmed, non-empty halves
pub(crate) fn split_range<'v>(column: &str, value: &'v str) -> Result<(&'v str, &'v str), EvalError> {
    let malformed = || EvalError::MalformedBetween {
        column: column.to_string(),
        value: value.to_string(),
    };
    let (min, max) = value.split_once(',').ok_or_else(malformed)?;
    let (min, max) = (min.trim(), max.trim());
    if min.is_empty() || max.is_empty() || max.contains(',') {
        return Err(malformed());
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        Sheet::from_csv_str(
            "region,amount,when,code\n\
             East,100,2024-01-05,A1\n\
             west,250.5,2024-02-10 08:30:00,b2\n\
             ,,,\n\
             North-East,1000,2024-03-01,A10\n",
        )
        .unwrap()
    }

    fn rows(mask: &RowMask) -> Vec<usize> {
        mask.iter()
            .enumerate()
            .filter(|(_, keep)| *keep)
            .map(|(i, _)| i)
            .collect()
    }

    fn eval(column: &str, op: Operator, value: &str) -> Vec<usize> {
        rows(&evaluate(&sheet(), column, op, value).unwrap())
    }

    #[test]
    fn test_missing_column_is_all_false() {
        let mask = evaluate(&sheet(), "nope", Operator::Equals, "x").unwrap();
        assert_eq!(mask.len(), 4);
        assert!(!mask.any());
    }

    #[test]
    fn test_contains_is_case_insensitive_and_skips_null() {
        assert_eq!(eval("region", Operator::Contains, "EAST"), vec![0, 3]);
        assert_eq!(eval("region", Operator::NotContains, "east"), vec![1, 2]);
        // contains works on the string form of numbers too
        assert_eq!(eval("amount", Operator::Contains, "00"), vec![0, 3]);
    }

    #[test]
    fn test_starts_ends_with() {
        assert_eq!(eval("code", Operator::StartsWith, "a"), vec![0, 3]);
        assert_eq!(eval("code", Operator::EndsWith, "0"), vec![3]);
    }

    #[test]
    fn test_is_empty() {
        assert_eq!(eval("region", Operator::IsEmpty, ""), vec![2]);
        assert_eq!(eval("region", Operator::IsNotEmpty, ""), vec![0, 1, 3]);
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(eval("amount", Operator::Greater, "100"), vec![1, 3]);
        assert_eq!(eval("amount", Operator::GreaterOrEqual, "100"), vec![0, 1, 3]);
        assert_eq!(eval("amount", Operator::Less, "250.5"), vec![0]);
        assert_eq!(eval("amount", Operator::LessOrEqual, "250.5"), vec![0, 1]);
        assert_eq!(eval("amount", Operator::Equals, "1000.0"), vec![3]);
        assert_eq!(eval("amount", Operator::NotEquals, "100"), vec![1, 2, 3]);
    }

    #[test]
    fn test_numeric_column_with_text_operand_compares_strings() {
        // "abc" sorts after every digit
        assert_eq!(eval("amount", Operator::Less, "abc"), vec![0, 1, 3]);
    }

    #[test]
    fn test_date_comparisons() {
        assert_eq!(eval("when", Operator::Equals, "2024-02-10"), vec![1]);
        assert_eq!(eval("when", Operator::Equals, "10/02/2024"), vec![1]);
        assert_eq!(eval("when", Operator::Greater, "2024-02-01"), vec![1, 3]);
        assert_eq!(
            eval("when", Operator::Between, "2024-01-01, 2024-02-28"),
            vec![0, 1]
        );
    }

    #[test]
    fn test_numeric_between() {
        assert_eq!(eval("amount", Operator::Between, "100,300"), vec![0, 1]);
    }

    #[test]
    fn test_between_min_greater_than_max() {
        let result = evaluate(&sheet(), "amount", Operator::Between, "500,100");
        assert!(matches!(result, Err(EvalError::InvalidRange { .. })));
    }

    #[test]
    fn test_malformed_between() {
        for value in ["100", "100,", ",5", "1,2,3"] {
            let result = evaluate(&sheet(), "amount", Operator::Between, value);
            assert!(
                matches!(result, Err(EvalError::MalformedBetween { .. })),
                "{value}"
            );
        }
    }

    #[test]
    fn test_text_equals_and_between() {
        assert_eq!(eval("code", Operator::Equals, "b2"), vec![1]);
        assert_eq!(eval("code", Operator::Between, "A1,A5"), vec![0, 3]);
    }

    #[test]
    fn test_exact_cell_string_matches() {
        let sheet = sheet();
        for row in 0..sheet.row_count() {
            for column in sheet.column_names() {
                let cell = sheet.get_by_name(row, column).unwrap();
                if cell.is_null() {
                    continue;
                }
                let text = cell.as_str();
                for op in [Operator::Equals, Operator::Contains] {
                    let mask = evaluate(&sheet, column, op, &text).unwrap();
                    assert!(mask[row], "{column} {op} {text}");
                }
            }
        }
    }

    #[test]
    fn test_nan_like_text_matches_itself() {
        let names = Sheet::from_csv_str("name\nAnn\nNan\n").unwrap();
        let mask = evaluate(&names, "name", Operator::Equals, "Nan").unwrap();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![false, true]);

        let mixed = Sheet::from_csv_str("x\n1\nnan\n").unwrap();
        assert_eq!(mixed.get(1, 0).unwrap().as_str(), "nan");
        let mask = evaluate(&mixed, "x", Operator::Equals, "nan").unwrap();
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![false, true]);
    }
}
