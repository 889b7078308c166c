//! Interactive query state: the plan being built, the last outcome and the
//! execution state machine.

use crate::condition::{Condition, DisplayField, Mode, QueryPlan};
use crate::engine::QueryEngine;
use crate::report::{QueryFailure, QueryResult, ReportKind};
use sheetquery_sheet::{Book, JoinType, Sheet, SheetError};
use std::fmt;

/// Where a session is in `select → build → execute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    SheetsSelected,
    ConditionsBuilt,
    Executing,
    Succeeded,
    EmptyResult,
    ConditionError,
    ContradictionError,
    /// Merge was impossible; re-executing in stack mode
    MergeFallback,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::SheetsSelected => "sheets selected",
            ExecutionState::ConditionsBuilt => "conditions built",
            ExecutionState::Executing => "executing",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::EmptyResult => "empty result",
            ExecutionState::ConditionError => "condition error",
            ExecutionState::ContradictionError => "contradiction error",
            ExecutionState::MergeFallback => "merge fallback",
        }
    }

    /// Outcome states; the next edit or execution leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded
                | ExecutionState::EmptyResult
                | ExecutionState::ConditionError
                | ExecutionState::ContradictionError
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query being built and run against one workbook.
///
/// Changing the sheet selection discards the conditions, display fields,
/// merge key and last outcome, since they refer to the old sheets.
pub struct QuerySession<'a> {
    engine: QueryEngine<'a>,
    plan: QueryPlan,
    state: ExecutionState,
    history: Vec<ExecutionState>,
    result: Option<QueryResult>,
    failure: Option<QueryFailure>,
}

impl<'a> QuerySession<'a> {
    pub fn new(engine: QueryEngine<'a>) -> Self {
        QuerySession {
            engine,
            plan: QueryPlan::default(),
            state: ExecutionState::Idle,
            history: vec![ExecutionState::Idle],
            result: None,
            failure: None,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub fn failure(&self) -> Option<&QueryFailure> {
        self.failure.as_ref()
    }

    pub fn book(&self) -> &'a Book {
        self.engine.book()
    }

    fn transition(&mut self, next: ExecutionState) {
        tracing::debug!(from = %self.state, to = %next, "query state");
        self.state = next;
        self.history.push(next);
    }

    /// After an edit, outcome states fall back to the matching build state
    fn edited(&mut self) {
        self.result = None;
        self.failure = None;
        let next = if self.plan.selected_sheets.is_empty() {
            ExecutionState::Idle
        } else if self.plan.conditions.iter().any(Condition::is_active) {
            ExecutionState::ConditionsBuilt
        } else {
            ExecutionState::SheetsSelected
        };
        if next != self.state {
            self.transition(next);
        }
    }

    /// Replace the sheet selection. Unknown sheets are rejected and leave
    /// the session as it was.
    pub fn select_sheets<S: AsRef<str>>(&mut self, sheets: &[S]) -> Result<(), QueryFailure> {
        let book = self.engine.book();
        let missing: Vec<String> = sheets
            .iter()
            .map(|s| s.as_ref())
            .filter(|name| !book.has_sheet(name))
            .map(|name| {
                SheetError::SheetNotFound {
                    name: name.to_string(),
                }
                .to_string()
            })
            .collect();
        if !missing.is_empty() {
            return Err(QueryFailure {
                kind: ReportKind::NoSelection,
                messages: missing,
            });
        }

        let mut plan = QueryPlan::new(sheets).with_mode(self.plan.mode);
        plan.join_type = self.plan.join_type;
        self.plan = plan;
        self.edited();
        Ok(())
    }

    pub fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.plan.conditions = conditions;
        self.edited();
    }

    pub fn add_condition(&mut self, condition: Condition) {
        self.plan.conditions.push(condition);
        self.edited();
    }

    pub fn set_display_fields(&mut self, fields: Vec<DisplayField>) {
        self.plan.display_fields = fields;
        self.edited();
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.plan.mode = mode;
        self.edited();
    }

    pub fn set_join_type(&mut self, join_type: JoinType) {
        self.plan.join_type = Some(join_type);
        self.edited();
    }

    pub fn set_merge_key(&mut self, key: Option<&str>) {
        self.plan.merge_key = key.map(str::to_string);
        self.edited();
    }

    fn selected(&self) -> Vec<&'a Sheet> {
        let book = self.engine.book();
        self.plan
            .sheets()
            .iter()
            .filter_map(|name| book.get_sheet(name).ok())
            .collect()
    }

    /// Union of the selected sheets' columns, first-seen order
    pub fn query_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for sheet in self.selected() {
            for column in sheet.column_names() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }

    /// Columns every selected sheet has, candidates for the merge key
    pub fn common_columns(&self) -> Vec<String> {
        Book::common_columns(&self.selected())
    }

    /// Run the current plan. Usage errors return the session to idle.
    pub fn execute(&mut self) -> Result<&QueryResult, QueryFailure> {
        self.result = None;
        self.failure = None;
        self.transition(ExecutionState::Executing);

        match self.engine.execute(&self.plan) {
            Ok(result) => {
                if result.fell_back {
                    self.transition(ExecutionState::MergeFallback);
                    self.transition(ExecutionState::Executing);
                }
                self.transition(ExecutionState::Succeeded);
                Ok(&*self.result.insert(result))
            }
            Err(failure) => {
                let next = match failure.kind {
                    ReportKind::EmptyResult => ExecutionState::EmptyResult,
                    ReportKind::ConditionError => ExecutionState::ConditionError,
                    ReportKind::ContradictionError => ExecutionState::ContradictionError,
                    ReportKind::NoSelection
                    | ReportKind::NoColumns
                    | ReportKind::NoConditions
                    | ReportKind::MergeUnavailable => ExecutionState::Idle,
                };
                tracing::debug!(kind = %failure.kind, "query failed");
                self.transition(next);
                self.failure = Some(failure.clone());
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;

    fn book() -> Book {
        let mut book = Book::new();
        book.add_sheet("A", Sheet::from_csv_str("id,v\n1,x\n2,y\n").unwrap())
            .unwrap();
        book.add_sheet("B", Sheet::from_csv_str("text\nhi\n").unwrap())
            .unwrap();
        book
    }

    #[test]
    fn test_happy_path_states() {
        let book = book();
        let mut session = QuerySession::new(QueryEngine::new(&book));
        session.select_sheets(&["A"]).unwrap();
        session.add_condition(Condition::new("v", Operator::Equals, "y"));
        let rows = session.execute().unwrap().table.row_count();
        assert_eq!(rows, 1);
        assert_eq!(
            session.history(),
            &[
                ExecutionState::Idle,
                ExecutionState::SheetsSelected,
                ExecutionState::ConditionsBuilt,
                ExecutionState::Executing,
                ExecutionState::Succeeded,
            ]
        );
    }

    #[test]
    fn test_merge_fallback_is_recorded() {
        let book = book();
        let mut session = QuerySession::new(QueryEngine::new(&book));
        session.set_mode(Mode::Merge);
        session.select_sheets(&["A", "B"]).unwrap();
        assert!(session.common_columns().is_empty());
        assert_eq!(session.query_columns(), vec!["id", "v", "text"]);

        assert!(session.execute().unwrap().fell_back);
        let tail = &session.history()[session.history().len() - 4..];
        assert_eq!(
            tail,
            &[
                ExecutionState::Executing,
                ExecutionState::MergeFallback,
                ExecutionState::Executing,
                ExecutionState::Succeeded,
            ]
        );
    }

    #[test]
    fn test_failures_map_to_states() {
        let book = book();
        let mut session = QuerySession::new(QueryEngine::new(&book));
        assert!(session.execute().is_err());
        assert_eq!(session.state(), ExecutionState::Idle);

        session.select_sheets(&["A"]).unwrap();
        session.add_condition(Condition::new("v", Operator::Equals, "zzz"));
        assert!(session.execute().is_err());
        assert_eq!(session.state(), ExecutionState::EmptyResult);
        assert!(session.failure().is_some());

        session.set_conditions(vec![Condition::new("nope", Operator::Equals, "1")]);
        assert_eq!(session.state(), ExecutionState::ConditionsBuilt);
        assert!(session.execute().is_err());
        assert_eq!(session.state(), ExecutionState::ConditionError);
    }

    #[test]
    fn test_reselecting_discards_conditions() {
        let book = book();
        let mut session = QuerySession::new(QueryEngine::new(&book));
        session.select_sheets(&["A"]).unwrap();
        session.add_condition(Condition::new("v", Operator::Equals, "y"));
        session.execute().unwrap();

        session.select_sheets(&["B"]).unwrap();
        assert!(session.plan().conditions.is_empty());
        assert!(session.result().is_none());
        assert_eq!(session.state(), ExecutionState::SheetsSelected);

        let failure = session.select_sheets(&["Missing"]).unwrap_err();
        assert_eq!(failure.kind, ReportKind::NoSelection);
        assert_eq!(session.plan().selected_sheets, vec!["B"]);
    }

    #[test]
    fn test_merge_settings_reach_the_engine() {
        let mut book = book();
        book.add_sheet("C", Sheet::from_csv_str("id,w\n2,z\n3,q\n").unwrap())
            .unwrap();
        let mut session = QuerySession::new(QueryEngine::new(&book));
        session.select_sheets(&["A", "C"]).unwrap();
        session.set_mode(Mode::Merge);
        session.set_join_type(JoinType::Inner);
        session.set_merge_key(Some("id"));
        session.set_display_fields(vec![DisplayField::new("w").with_label("W")]);

        let result = session.execute().unwrap();
        assert!(!result.fell_back);
        assert_eq!(result.table.column_names(), &["data source", "W"]);
        assert_eq!(result.table.row_count(), 1);
        assert!(session.state().is_terminal());

        session.set_merge_key(None);
        assert_eq!(session.state(), ExecutionState::SheetsSelected);
        assert!(!session.state().is_terminal());
    }
}
