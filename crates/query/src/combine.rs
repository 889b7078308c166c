//! Fold per-condition masks into one, left to right.

use crate::condition::{Condition, Logic};
use crate::contradiction::find_contradictions;
use crate::evaluate::ConditionEvaluator;
use crate::report::Diagnostic;
use sheetquery_sheet::{RowMask, Sheet};

/// How combining ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineStatus {
    /// Every condition was evaluated
    Evaluated,
    /// Static check found unsatisfiable conditions; no row was scanned
    Contradiction,
    /// At least one condition could not be evaluated
    InvalidCondition,
}

/// Result of combining conditions on one sheet
#[derive(Debug, Clone)]
pub struct Combined {
    pub mask: RowMask,
    pub diagnostics: Vec<Diagnostic>,
    pub status: CombineStatus,
    /// Condition columns the sheet does not have
    pub missing_columns: Vec<String>,
}

impl Combined {
    fn unfiltered(rows: usize) -> Self {
        Combined {
            mask: RowMask::all(rows),
            diagnostics: Vec::new(),
            status: CombineStatus::Evaluated,
            missing_columns: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CombineStatus::Evaluated
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionCombiner {
    evaluator: ConditionEvaluator,
}

impl ConditionCombiner {
    pub fn new(evaluator: ConditionEvaluator) -> Self {
        ConditionCombiner { evaluator }
    }

    /// Combine `conditions` into one mask over `sheet`.
    ///
    /// Inactive conditions (blank value) are skipped. Contradictions are
    /// checked first and yield an all-false mask. Evaluation errors become
    /// an all-false mask for that condition plus an error diagnostic;
    /// nothing is raised.
    pub fn combine(&self, sheet: &Sheet, conditions: &[Condition]) -> Combined {
        let rows = sheet.row_count();
        let active: Vec<&Condition> = conditions.iter().filter(|c| c.is_active()).collect();
        if active.is_empty() {
            return Combined::unfiltered(rows);
        }

        let contradictions = find_contradictions(&active);
        if !contradictions.is_empty() {
            tracing::debug!(sheet = sheet.name(), count = contradictions.len(), "contradictory conditions");
            return Combined {
                mask: RowMask::none(rows),
                diagnostics: contradictions
                    .iter()
                    .map(|c| Diagnostic::error(c.to_string()))
                    .collect(),
                status: CombineStatus::Contradiction,
                missing_columns: Vec::new(),
            };
        }

        let mut diagnostics = Vec::new();
        let mut status = CombineStatus::Evaluated;
        let mut missing_columns: Vec<String> = Vec::new();
        let mut cumulative: Option<RowMask> = None;
        let mut reported_empty = false;

        for (i, condition) in active.iter().enumerate() {
            let mask = if sheet.has_column(&condition.column) {
                match self.evaluator.evaluate(
                    sheet,
                    &condition.column,
                    condition.operator,
                    &condition.value,
                ) {
                    Ok(mask) => {
                        if rows > 0 && !mask.any() {
                            diagnostics.push(Diagnostic::warning(format!(
                                "no matching data for condition {condition} in sheet '{}'",
                                sheet.name()
                            )));
                        }
                        mask
                    }
                    Err(e) => {
                        status = CombineStatus::InvalidCondition;
                        diagnostics.push(Diagnostic::error(format!("condition {condition}: {e}")));
                        RowMask::none(rows)
                    }
                }
            } else {
                if !missing_columns.contains(&condition.column) {
                    missing_columns.push(condition.column.clone());
                }
                RowMask::none(rows)
            };

            let folded = match cumulative {
                None => mask,
                Some(acc) => match condition.logic_or_default() {
                    Logic::And => acc.and(&mask),
                    Logic::Or => acc.or(&mask),
                    Logic::AndNot => acc.and_not(&mask),
                },
            };

            if i > 0 && rows > 0 && !reported_empty && !folded.any() {
                reported_empty = true;
                diagnostics.push(Diagnostic::warning(format!(
                    "no rows of sheet '{}' remain after applying {} {condition}",
                    sheet.name(),
                    condition.logic_or_default()
                )));
            }
            cumulative = Some(folded);
        }

        let mask = cumulative.unwrap_or_else(|| RowMask::all(rows));
        tracing::debug!(
            sheet = sheet.name(),
            conditions = active.len(),
            matched = mask.count(),
            rows,
            "combined conditions"
        );

        Combined {
            mask,
            diagnostics,
            status,
            missing_columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use crate::report::Severity;

    fn sheet() -> Sheet {
        Sheet::from_csv_str(
            "region,amount\n\
             East,100\n\
             West,600\n\
             North,1500\n\
             East,2000\n",
        )
        .unwrap()
    }

    fn selected(combined: &Combined) -> Vec<usize> {
        combined
            .mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| *keep)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_no_active_conditions_selects_everything() {
        let combined = ConditionCombiner::default()
            .combine(&sheet(), &[Condition::new("amount", Operator::Greater, " ")]);
        assert_eq!(combined.mask.count(), 4);
        assert!(combined.diagnostics.is_empty());
    }

    #[test]
    fn test_and_or_and_not_fold_left_to_right() {
        let conditions = vec![
            Condition::new("region", Operator::Equals, "East"),
            Condition::new("amount", Operator::Greater, "1000").with_logic(Logic::Or),
            Condition::new("amount", Operator::Equals, "2000").with_logic(Logic::AndNot),
        ];
        let combined = ConditionCombiner::default().combine(&sheet(), &conditions);
        // (East OR amount > 1000) AND NOT amount = 2000
        assert_eq!(selected(&combined), vec![0, 2]);
        assert!(combined.is_ok());
    }

    #[test]
    fn test_empty_match_warnings() {
        let conditions = vec![
            Condition::new("region", Operator::Equals, "West"),
            Condition::new("amount", Operator::Greater, "1000").with_logic(Logic::And),
            Condition::new("region", Operator::Contains, "south").with_logic(Logic::Or),
        ];
        let combined = ConditionCombiner::default().combine(&sheet(), &conditions);
        assert!(!combined.mask.any());

        let messages: Vec<&str> = combined
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert!(messages[0].contains("no rows of sheet"));
        assert!(messages[0].contains("amount greater \"1000\""));
        assert!(messages[1].starts_with("no matching data for condition region contains"));
        assert!(combined
            .diagnostics
            .iter()
            .all(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn test_contradiction_short_circuits() {
        let conditions = vec![
            Condition::new("amount", Operator::Greater, "1000"),
            Condition::new("amount", Operator::Less, "500").with_logic(Logic::And),
        ];
        let combined = ConditionCombiner::default().combine(&sheet(), &conditions);
        assert_eq!(combined.status, CombineStatus::Contradiction);
        assert!(!combined.mask.any());
        assert_eq!(combined.diagnostics.len(), 1);
        assert!(combined.diagnostics[0].message.contains("amount"));
    }

    #[test]
    fn test_evaluation_error_is_collected() {
        let conditions = vec![
            Condition::new("amount", Operator::Between, "900,100"),
            Condition::new("region", Operator::Equals, "East").with_logic(Logic::Or),
        ];
        let combined = ConditionCombiner::default().combine(&sheet(), &conditions);
        assert_eq!(combined.status, CombineStatus::InvalidCondition);
        assert!(combined.diagnostics.iter().any(Diagnostic::is_error));
        // The failed condition contributes an all-false mask
        assert_eq!(selected(&combined), vec![0, 3]);
    }

    #[test]
    fn test_missing_column_is_reported_to_caller() {
        let conditions = vec![Condition::new("price", Operator::Greater, "1")];
        let combined = ConditionCombiner::default().combine(&sheet(), &conditions);
        assert_eq!(combined.missing_columns, vec!["price"]);
        assert!(!combined.mask.any());
    }
}
