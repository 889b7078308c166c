//! Runs a [`QueryPlan`] against a [`Book`]: validation, filtering, stacking
//! or merging, then post-processing and projection.

use crate::combine::ConditionCombiner;
use crate::condition::{Condition, Mode, QueryPlan};
use crate::config::QueryConfig;
use crate::contradiction::find_contradictions;
use crate::evaluate::ConditionEvaluator;
use crate::merge::MergeCombiner;
use crate::progress::{ProgressCallback, ProgressObserver};
use crate::project::project;
use crate::report::{Diagnostic, QueryFailure, QueryResult, ReportKind};
use crate::stack::StackCombiner;
use sheetquery_sheet::{Book, Sheet};

/// Executes query plans over one loaded workbook.
///
/// The engine never mutates the book; every execution builds new tables.
pub struct QueryEngine<'a> {
    book: &'a Book,
    config: QueryConfig,
    observer: Option<ProgressCallback<'a>>,
}

/// Output of the combine phase before post-processing
struct Combined {
    table: Sheet,
    mode: Mode,
    fell_back: bool,
}

impl<'a> QueryEngine<'a> {
    pub fn new(book: &'a Book) -> Self {
        QueryEngine {
            book,
            config: QueryConfig::default(),
            observer: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, observer: impl ProgressObserver + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn book(&self) -> &'a Book {
        self.book
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn observer(&self) -> Option<&dyn ProgressObserver> {
        self.observer.as_ref().map(|o| &**o as &dyn ProgressObserver)
    }

    fn report(&self, percent: u8, status: &str) {
        if let Some(observer) = &self.observer {
            observer.report(percent, status);
        }
    }

    /// Resolve the selected sheets, or fail with every missing name
    fn resolve_sheets(&self, names: &[String]) -> Result<Vec<&'a Sheet>, QueryFailure> {
        if names.is_empty() {
            return Err(QueryFailure::new(ReportKind::NoSelection, "no sheet selected"));
        }

        let mut sheets = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.book.get_sheet(name) {
                Ok(sheet) => sheets.push(sheet),
                Err(e) => missing.push(e.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(QueryFailure {
                kind: ReportKind::NoSelection,
                messages: missing,
            });
        }

        if sheets.iter().all(|s| s.col_count() == 0) {
            return Err(QueryFailure::new(
                ReportKind::NoColumns,
                "the selected sheets have no columns",
            ));
        }
        Ok(sheets)
    }

    /// Run `plan` to completion.
    ///
    /// Usage errors and contradictions are reported before any row is
    /// scanned. A merge over sheets sharing no column falls back to
    /// stacking with a notice; no other failure is retried.
    pub fn execute(&self, plan: &QueryPlan) -> Result<QueryResult, QueryFailure> {
        let names = plan.sheets();
        let sheets = self.resolve_sheets(&names)?;
        let conditions = plan.qualified_conditions();
        let mut notices = Vec::new();

        let active: Vec<&Condition> = conditions.iter().filter(|c| c.is_active()).collect();
        if active.is_empty() {
            notices.push(Diagnostic::warning(format!(
                "{}: every row of the selected sheets is included",
                ReportKind::NoConditions
            )));
        }

        let contradictions = find_contradictions(&active);
        if !contradictions.is_empty() {
            tracing::warn!(count = contradictions.len(), "query has contradictory conditions");
            return Err(QueryFailure {
                kind: ReportKind::ContradictionError,
                messages: contradictions.iter().map(ToString::to_string).collect(),
            });
        }

        tracing::info!(sheets = ?names, mode = %plan.mode, conditions = active.len(), "executing query");
        self.report(5, "query validated");

        let combiner = ConditionCombiner::new(ConditionEvaluator::new(
            self.config.effective_sample_size(),
        ));
        let combined = match plan.mode {
            Mode::Stack => self.run_stack(&combiner, &sheets, &conditions, &mut notices)?,
            Mode::Merge => self.run_merge(&combiner, plan, &sheets, &conditions, &mut notices)?,
        };

        self.report(90, "preparing result");
        let provenance = self.config.provenance_column.as_str();
        let mut table = combined.table;

        if self.config.drop_empty_rows {
            let removed = table.remove_null_rows(&[provenance]);
            if removed > 0 {
                notices.push(Diagnostic::info(format!("removed {removed} empty rows")));
            }
        }
        if table.is_empty() {
            return Err(QueryFailure::from_diagnostics(ReportKind::EmptyResult, &notices)
                .with_message("no matching data found in the selected sheets"));
        }

        let (table, projection_notices) =
            project(&table, &plan.display_fields, provenance, &names)?;
        notices.extend(projection_notices);

        tracing::info!(
            rows = table.row_count(),
            columns = table.col_count(),
            mode = %combined.mode,
            "query finished"
        );
        self.report(100, "done");

        Ok(QueryResult {
            table,
            notices,
            mode: combined.mode,
            fell_back: combined.fell_back,
        })
    }

    fn run_stack(
        &self,
        combiner: &ConditionCombiner,
        sheets: &[&Sheet],
        conditions: &[Condition],
        notices: &mut Vec<Diagnostic>,
    ) -> Result<Combined, QueryFailure> {
        let stacked = StackCombiner::new(combiner, &self.config.provenance_column).run(
            sheets,
            conditions,
            self.observer(),
        )?;
        notices.extend(stacked.diagnostics);
        Ok(Combined {
            table: stacked.table,
            mode: Mode::Stack,
            fell_back: false,
        })
    }

    fn fall_back(
        &self,
        combiner: &ConditionCombiner,
        sheets: &[&Sheet],
        conditions: &[Condition],
        notices: &mut Vec<Diagnostic>,
    ) -> Result<Combined, QueryFailure> {
        let mut combined = self.run_stack(combiner, sheets, conditions, notices)?;
        combined.fell_back = true;
        Ok(combined)
    }

    fn run_merge(
        &self,
        combiner: &ConditionCombiner,
        plan: &QueryPlan,
        sheets: &[&Sheet],
        conditions: &[Condition],
        notices: &mut Vec<Diagnostic>,
    ) -> Result<Combined, QueryFailure> {
        if sheets.len() < 2 {
            notices.push(Diagnostic::info(
                "merging needs at least two sheets; stacking instead",
            ));
            return self.fall_back(combiner, sheets, conditions, notices);
        }

        let common = Book::common_columns(sheets);
        let Some(default_key) = common.first() else {
            tracing::warn!("selected sheets share no column, falling back to stack");
            notices.push(Diagnostic::warning(format!(
                "{}: the selected sheets share no column; stacking instead",
                ReportKind::MergeUnavailable
            )));
            return self.fall_back(combiner, sheets, conditions, notices);
        };

        let key = plan.merge_key.as_deref().unwrap_or(default_key);
        let join_type = plan.join_type.unwrap_or(self.config.default_join);
        tracing::debug!(key, %join_type, "merging sheets");

        let merger = MergeCombiner::new(
            combiner,
            &self.config.provenance_column,
            &self.config.merged_marker,
        );
        match merger.run(sheets, key, join_type, conditions, self.observer()) {
            Ok(merged) => {
                notices.extend(merged.diagnostics);
                Ok(Combined {
                    table: merged.table,
                    mode: Mode::Merge,
                    fell_back: false,
                })
            }
            Err(failure) if failure.kind == ReportKind::MergeUnavailable => {
                tracing::warn!(key, "no sheet has the merge key, falling back to stack");
                notices.extend(failure.messages.into_iter().map(Diagnostic::warning));
                self.fall_back(combiner, sheets, conditions, notices)
            }
            Err(failure) => Err(failure),
        }
    }
}
