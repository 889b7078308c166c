//! Stack mode: filter each sheet, tag rows with their sheet, then union.

use crate::combine::{CombineStatus, ConditionCombiner};
use crate::condition::Condition;
use crate::progress::{scaled, ProgressObserver};
use crate::report::{Diagnostic, QueryFailure, ReportKind};
use sheetquery_sheet::{Book, CellValue, Result, Sheet};

/// Copy of `sheet` with `column` holding `value` inserted leftmost.
/// An existing column of that name is replaced.
pub fn tag_provenance(sheet: &Sheet, column: &str, value: &CellValue) -> Result<Sheet> {
    let mut tagged = sheet.clone();
    if tagged.has_column(column) {
        let keep: Vec<String> = tagged
            .column_names()
            .iter()
            .filter(|c| *c != column)
            .cloned()
            .collect();
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        tagged.select_columns(&keep)?;
    }
    tagged.column_insert_constant(0, column, value)?;
    Ok(tagged)
}

/// Vertically union `tables` in order.
///
/// Empty tables are skipped. Every row is tagged with its table's name in
/// the `provenance` column, columns are aligned by name (missing cells are
/// null) and rows keep their order. Returns `None` when every table is
/// empty.
pub fn stack(tables: &[Sheet], provenance: &str) -> Result<Option<Sheet>> {
    let tagged = tables
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| tag_provenance(t, provenance, &CellValue::from(t.name())))
        .collect::<Result<Vec<Sheet>>>()?;

    if tagged.is_empty() {
        return Ok(None);
    }

    let aligned = Book::align_columns(&tagged)?;
    let columns: Vec<String> = aligned[0].column_names().to_vec();
    let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

    let mut result = Sheet::with_columns("stacked", columns.clone())?;
    for mut table in aligned {
        table.select_columns(&column_refs)?;
        for row in table.rows() {
            result.row_append(row.clone())?;
        }
    }

    Ok(Some(result))
}

/// Filters each selected sheet with its conditions, then stacks them
pub struct StackCombiner<'a> {
    combiner: &'a ConditionCombiner,
    provenance: &'a str,
}

/// A stacked table with the diagnostics gathered while building it
#[derive(Debug)]
pub struct Stacked {
    pub table: Sheet,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> StackCombiner<'a> {
    pub fn new(combiner: &'a ConditionCombiner, provenance: &'a str) -> Self {
        StackCombiner {
            combiner,
            provenance,
        }
    }

    /// Run stack mode over `sheets` (selection order).
    ///
    /// A qualified condition only filters its own sheet. An unqualified
    /// condition whose column is absent from some sheets filters those
    /// sheets to nothing, with a warning; absent from every sheet, it is a
    /// condition error.
    pub fn run(
        &self,
        sheets: &[&Sheet],
        conditions: &[Condition],
        observer: Option<&dyn ProgressObserver>,
    ) -> std::result::Result<Stacked, QueryFailure> {
        let mut diagnostics = Vec::new();
        check_columns(sheets, conditions)?;

        let mut filtered: Vec<Sheet> = Vec::with_capacity(sheets.len());
        let mut failed = false;

        for (i, sheet) in sheets.iter().enumerate() {
            if let Some(observer) = observer {
                observer.report(
                    scaled(10, 80, i, sheets.len()),
                    &format!("filtering sheet '{}'", sheet.name()),
                );
            }

            if sheet.is_empty() {
                diagnostics.push(Diagnostic::info(format!(
                    "sheet '{}' has no rows and was skipped",
                    sheet.name()
                )));
                continue;
            }

            let own: Vec<Condition> = conditions
                .iter()
                .filter(|c| c.applies_to.as_deref().map_or(true, |s| s == sheet.name()))
                .cloned()
                .collect();

            let combined = self.combiner.combine(sheet, &own);
            for column in &combined.missing_columns {
                diagnostics.push(Diagnostic::warning(format!(
                    "sheet '{}' has no column '{column}'; conditions on it match nothing there",
                    sheet.name()
                )));
            }
            diagnostics.extend(combined.diagnostics.iter().cloned());

            match combined.status {
                CombineStatus::Contradiction => {
                    return Err(QueryFailure::from_diagnostics(
                        ReportKind::ContradictionError,
                        &combined.diagnostics,
                    ));
                }
                CombineStatus::InvalidCondition => {
                    failed = true;
                    continue;
                }
                CombineStatus::Evaluated => {}
            }

            let kept = sheet.filter_by_mask(&combined.mask)?;
            tracing::info!(sheet = sheet.name(), rows = kept.row_count(), "filtered sheet");
            filtered.push(kept);
        }

        if failed {
            let errors: Vec<Diagnostic> =
                diagnostics.iter().filter(|d| d.is_error()).cloned().collect();
            return Err(QueryFailure::from_diagnostics(
                ReportKind::ConditionError,
                &errors,
            ));
        }

        match stack(&filtered, self.provenance)? {
            Some(table) => Ok(Stacked { table, diagnostics }),
            None => Err(QueryFailure::from_diagnostics(
                ReportKind::EmptyResult,
                &diagnostics,
            )
            .with_message("no matching data found in the selected sheets")),
        }
    }
}

/// Every active condition must name a column that exists somewhere
fn check_columns(sheets: &[&Sheet], conditions: &[Condition]) -> std::result::Result<(), QueryFailure> {
    let mut messages = Vec::new();
    for condition in conditions.iter().filter(|c| c.is_active()) {
        match &condition.applies_to {
            Some(name) => {
                let found = sheets
                    .iter()
                    .find(|s| s.name() == name)
                    .is_some_and(|s| s.has_column(&condition.column));
                if !found {
                    messages.push(format!(
                        "column '{}' not found in sheet '{name}'",
                        condition.column
                    ));
                }
            }
            None => {
                if !sheets.iter().any(|s| s.has_column(&condition.column)) {
                    messages.push(format!(
                        "column '{}' not found in any selected sheet",
                        condition.column
                    ));
                }
            }
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(QueryFailure {
            kind: ReportKind::ConditionError,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;

    fn named(name: &str, csv: &str) -> Sheet {
        let mut sheet = Sheet::from_csv_str(csv).unwrap();
        sheet.set_name(name);
        sheet
    }

    #[test]
    fn test_stack_tags_and_aligns() {
        let a = named("A", "id,name\n1,x\n");
        let b = named("B", "qty,id\n5,2\n6,3\n");
        let stacked = stack(&[a, b], "source").unwrap().unwrap();

        assert_eq!(stacked.column_names(), &["source", "id", "name", "qty"]);
        assert_eq!(stacked.row_count(), 3);
        assert_eq!(stacked.get_by_name(0, "source").unwrap(), &CellValue::from("A"));
        assert_eq!(stacked.get_by_name(0, "qty").unwrap(), &CellValue::Null);
        assert_eq!(stacked.get_by_name(2, "id").unwrap(), &CellValue::Int(3));
        assert_eq!(stacked.get_by_name(2, "name").unwrap(), &CellValue::Null);
    }

    #[test]
    fn test_stack_of_empty_tables() {
        let a = named("A", "id\n");
        assert!(stack(&[a], "source").unwrap().is_none());
        assert!(stack(&[], "source").unwrap().is_none());
    }

    #[test]
    fn test_existing_provenance_column_is_replaced() {
        let a = named("A", "source,v\nold,1\n");
        let tagged = tag_provenance(&a, "source", &CellValue::from("A")).unwrap();
        assert_eq!(tagged.column_names(), &["source", "v"]);
        assert_eq!(tagged.get(0, 0).unwrap(), &CellValue::from("A"));
    }

    #[test]
    fn test_qualified_condition_filters_only_its_sheet() {
        let a = named("A", "v\n1\n2\n");
        let b = named("B", "v\n1\n2\n");
        let combiner = ConditionCombiner::default();
        let stacker = StackCombiner::new(&combiner, "source");
        let conditions = vec![Condition::new("v", Operator::Equals, "2").for_sheet("B")];

        let stacked = stacker.run(&[&a, &b], &conditions, None).unwrap();
        assert_eq!(stacked.table.row_count(), 3);
    }

    #[test]
    fn test_column_missing_everywhere_is_condition_error() {
        let a = named("A", "v\n1\n");
        let combiner = ConditionCombiner::default();
        let stacker = StackCombiner::new(&combiner, "source");
        let conditions = vec![Condition::new("w", Operator::Equals, "1")];

        let failure = stacker.run(&[&a], &conditions, None).unwrap_err();
        assert_eq!(failure.kind, ReportKind::ConditionError);
        assert!(failure.messages[0].contains("'w'"));
    }

    #[test]
    fn test_column_missing_in_one_sheet_is_warning() {
        let a = named("A", "v\n1\n");
        let b = named("B", "w\n1\n");
        let combiner = ConditionCombiner::default();
        let stacker = StackCombiner::new(&combiner, "source");
        let conditions = vec![Condition::new("w", Operator::Equals, "1")];

        let stacked = stacker.run(&[&a, &b], &conditions, None).unwrap();
        assert_eq!(stacked.table.row_count(), 1);
        assert!(stacked
            .diagnostics
            .iter()
            .any(|d| d.message.contains("sheet 'A' has no column 'w'")));
    }
}
