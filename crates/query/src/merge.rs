//! Merge mode: pre-filter sheets with their own conditions, join them on a
//! key column, then apply the conditions that only make sense on the
//! joined table.

use crate::combine::{CombineStatus, ConditionCombiner};
use crate::condition::Condition;
use crate::contradiction::find_contradictions;
use crate::progress::{scaled, ProgressObserver};
use crate::report::{Diagnostic, QueryFailure, ReportKind};
use crate::stack::tag_provenance;
use sheetquery_sheet::{CellValue, JoinType, Result, Sheet};
use std::collections::{HashMap, HashSet};

/// A joined table with the diagnostics gathered while building it
#[derive(Debug)]
pub struct Merged {
    pub table: Sheet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Join state: the table so far plus the sheet each column came from.
///
/// When a right-hand column collides with an existing one, both sides are
/// renamed to `<column>_<sheet>`; later sheets bringing the same column are
/// suffixed the same way. The key column is never renamed.
#[derive(Debug, Clone)]
struct JoinedTable {
    table: Sheet,
    key: String,
    origin: HashMap<String, String>,
    collided: HashSet<String>,
    sheets: Vec<String>,
}

impl JoinedTable {
    fn start(sheet: &Sheet, key: &str) -> Self {
        let origin = sheet
            .column_names()
            .iter()
            .filter(|c| *c != key)
            .map(|c| (c.clone(), sheet.name().to_string()))
            .collect();
        JoinedTable {
            table: sheet.clone(),
            key: key.to_string(),
            origin,
            collided: HashSet::new(),
            sheets: vec![sheet.name().to_string()],
        }
    }

    /// Join `right` in. On error `self` is left as it was.
    fn join(&mut self, right: &Sheet, join_type: JoinType) -> Result<()> {
        let mut next = self.clone();
        let right_name = right.name();
        let mut right = right.clone();

        for column in right.column_names().to_vec() {
            if column == self.key {
                continue;
            }
            if next.table.has_column(&column) {
                let left_origin = next
                    .origin
                    .remove(&column)
                    .unwrap_or_else(|| next.sheets[0].clone());
                let left_name = format!("{column}_{left_origin}");
                next.table.rename_column(&column, &left_name)?;
                next.origin.insert(left_name, left_origin);
                next.collided.insert(column.clone());
                right.rename_column(&column, &format!("{column}_{right_name}"))?;
            } else if next.collided.contains(&column) {
                right.rename_column(&column, &format!("{column}_{right_name}"))?;
            }
        }

        next.table = next.table.join(&right, &next.key, join_type)?;
        for column in right.column_names() {
            if *column != next.key {
                next.origin
                    .entry(column.clone())
                    .or_insert_with(|| right_name.to_string());
            }
        }
        next.sheets.push(right_name.to_string());

        *self = next;
        Ok(())
    }
}

/// Joins selected sheets on a key column
pub struct MergeCombiner<'a> {
    combiner: &'a ConditionCombiner,
    provenance: &'a str,
    marker: &'a str,
}

impl<'a> MergeCombiner<'a> {
    pub fn new(combiner: &'a ConditionCombiner, provenance: &'a str, marker: &'a str) -> Self {
        MergeCombiner {
            combiner,
            provenance,
            marker,
        }
    }

    /// Run merge mode over `sheets` (selection order), joining on `key`.
    ///
    /// A condition goes to every sheet that has its column (or only to its
    /// qualifying sheet). Conditions no sheet can take are resolved against
    /// the joined table. A sheet filtered to nothing is left out; sheets
    /// without conditions are joined afterwards for left and outer joins.
    /// Sheets lacking the key are skipped with a warning.
    pub fn run(
        &self,
        sheets: &[&Sheet],
        key: &str,
        join_type: JoinType,
        conditions: &[Condition],
        observer: Option<&dyn ProgressObserver>,
    ) -> std::result::Result<Merged, QueryFailure> {
        let report = |percent: u8, status: String| {
            if let Some(observer) = observer {
                observer.report(percent, &status);
            }
        };

        let active: Vec<&Condition> = conditions.iter().filter(|c| c.is_active()).collect();
        let contradictions = find_contradictions(&active);
        if !contradictions.is_empty() {
            return Err(QueryFailure {
                kind: ReportKind::ContradictionError,
                messages: contradictions.iter().map(ToString::to_string).collect(),
            });
        }

        let (per_sheet, global) = partition(sheets, &active);
        let mut diagnostics = Vec::new();

        let to_join: Vec<Sheet> = if per_sheet.iter().all(Vec::is_empty) {
            sheets.iter().map(|s| (*s).clone()).collect()
        } else {
            let mut survivors = Vec::new();
            let mut deferred = Vec::new();
            let mut failed = false;

            for (i, (sheet, own)) in sheets.iter().zip(&per_sheet).enumerate() {
                if own.is_empty() {
                    deferred.push((*sheet).clone());
                    continue;
                }
                report(
                    scaled(10, 50, i, sheets.len()),
                    format!("filtering sheet '{}'", sheet.name()),
                );

                let combined = self.combiner.combine(sheet, own);
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
                tracing::info!(sheet = sheet.name(), rows = kept.row_count(), "pre-filtered sheet");
                if kept.is_empty() {
                    diagnostics.push(Diagnostic::info(format!(
                        "sheet '{}' has no rows matching its conditions and is left out of the merge",
                        sheet.name()
                    )));
                } else {
                    survivors.push(kept);
                }
            }

            if failed {
                return Err(condition_errors(&diagnostics));
            }
            if survivors.is_empty() {
                return Err(QueryFailure::from_diagnostics(ReportKind::EmptyResult, &diagnostics)
                    .with_message("no sheet has rows matching its conditions"));
            }

            if join_type.keeps_unmatched_left() {
                survivors.extend(deferred);
            } else {
                for sheet in &deferred {
                    diagnostics.push(Diagnostic::info(format!(
                        "sheet '{}' has no conditions and is not joined under an inner join",
                        sheet.name()
                    )));
                }
            }
            survivors
        };

        let mut joined = self.join_all(&to_join, key, join_type, &mut diagnostics, &report)?;

        if !global.is_empty() {
            report(85, "applying conditions to the merged table".to_string());
            joined = self.apply_global(&joined, &global, &mut diagnostics)?;
        }

        if joined.is_empty() {
            return Err(QueryFailure::from_diagnostics(ReportKind::EmptyResult, &diagnostics)
                .with_message(format!("merging on '{key}' produced no rows")));
        }

        let mut table = tag_provenance(&joined, self.provenance, &CellValue::from(self.marker))?;
        table.set_name("merged");
        Ok(Merged { table, diagnostics })
    }

    fn join_all(
        &self,
        tables: &[Sheet],
        key: &str,
        join_type: JoinType,
        diagnostics: &mut Vec<Diagnostic>,
        report: &dyn Fn(u8, String),
    ) -> std::result::Result<Sheet, QueryFailure> {
        let mut joined: Option<JoinedTable> = None;

        for (i, table) in tables.iter().enumerate() {
            if !table.has_column(key) {
                tracing::warn!(sheet = table.name(), key, "sheet lacks merge key");
                diagnostics.push(Diagnostic::warning(format!(
                    "sheet '{}' has no key column '{key}' and was left out of the merge",
                    table.name()
                )));
                continue;
            }

            match joined.as_mut() {
                None => joined = Some(JoinedTable::start(table, key)),
                Some(acc) => {
                    report(
                        scaled(50, 80, i, tables.len()),
                        format!("joining sheet '{}'", table.name()),
                    );
                    match acc.join(table, join_type) {
                        Ok(()) => tracing::debug!(
                            sheet = table.name(),
                            rows = acc.table.row_count(),
                            %join_type,
                            "joined sheet"
                        ),
                        Err(e) => diagnostics.push(Diagnostic::warning(format!(
                            "joining sheet '{}' failed: {e}",
                            table.name()
                        ))),
                    }
                }
            }
        }

        joined.map(|j| j.table).ok_or_else(|| {
            QueryFailure::from_diagnostics(ReportKind::MergeUnavailable, diagnostics)
                .with_message(format!("no selected sheet has the key column '{key}'"))
        })
    }

    fn apply_global(
        &self,
        joined: &Sheet,
        global: &[&Condition],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> std::result::Result<Sheet, QueryFailure> {
        let mut resolved = Vec::with_capacity(global.len());
        let mut unresolved = Vec::new();
        for condition in global {
            match resolve_column(joined, condition) {
                Some(column) => {
                    let mut c = (*condition).clone();
                    c.column = column;
                    c.applies_to = None;
                    resolved.push(c);
                }
                None => unresolved.push(format!(
                    "column '{}' not found in the merged table",
                    condition.qualified_column()
                )),
            }
        }
        if !unresolved.is_empty() {
            return Err(QueryFailure {
                kind: ReportKind::ConditionError,
                messages: unresolved,
            });
        }

        let combined = self.combiner.combine(joined, &resolved);
        diagnostics.extend(combined.diagnostics.iter().cloned());
        match combined.status {
            CombineStatus::Contradiction => Err(QueryFailure::from_diagnostics(
                ReportKind::ContradictionError,
                &combined.diagnostics,
            )),
            CombineStatus::InvalidCondition => Err(condition_errors(diagnostics)),
            CombineStatus::Evaluated => Ok(joined.filter_by_mask(&combined.mask)?),
        }
    }
}

/// Split active conditions into per-sheet lists and the rest
fn partition<'c>(
    sheets: &[&Sheet],
    active: &[&'c Condition],
) -> (Vec<Vec<Condition>>, Vec<&'c Condition>) {
    let mut per_sheet = vec![Vec::new(); sheets.len()];
    let mut global = Vec::new();

    for condition in active {
        let mut placed = false;
        for (sheet, own) in sheets.iter().zip(per_sheet.iter_mut()) {
            let applies = condition
                .applies_to
                .as_deref()
                .map_or(true, |s| s == sheet.name());
            if applies && sheet.has_column(&condition.column) {
                own.push((*condition).clone());
                placed = true;
            }
        }
        if !placed {
            global.push(*condition);
        }
    }

    (per_sheet, global)
}

/// Column of the joined table a leftover condition refers to.
///
/// Unqualified: the exact name, else the first `<column>_<suffix>`.
/// Qualified with a sheet: `<column>_<sheet>`, else the exact name.
fn resolve_column(joined: &Sheet, condition: &Condition) -> Option<String> {
    let column = &condition.column;
    if let Some(sheet) = &condition.applies_to {
        let suffixed = format!("{column}_{sheet}");
        if joined.has_column(&suffixed) {
            return Some(suffixed);
        }
        return joined.has_column(column).then(|| column.clone());
    }

    if joined.has_column(column) {
        return Some(column.clone());
    }
    let prefix = format!("{column}_");
    joined
        .column_names()
        .iter()
        .find(|c| c.starts_with(&prefix))
        .cloned()
}

fn condition_errors(diagnostics: &[Diagnostic]) -> QueryFailure {
    let errors: Vec<Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).cloned().collect();
    QueryFailure::from_diagnostics(ReportKind::ConditionError, &errors)
}
