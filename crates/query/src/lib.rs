//! Multi-sheet query engine for sheetquery
//!
//! A [`QueryPlan`] names the sheets to read, the [`Condition`]s to filter
//! them with and how to combine them:
//!
//! - **stack**: filter every sheet, tag each row with its sheet name and
//!   union the rows, aligning columns by name;
//! - **merge**: pre-filter sheets with their own conditions, join them on a
//!   shared key column, then apply whatever conditions only the joined
//!   table can answer.
//!
//! Conditions are evaluated per column type (numeric, date or text) and
//! folded left to right with `AND`, `OR` and `AND NOT`. Numeric bounds that
//! can never hold together are reported before any row is scanned.
//!
//! # Examples
//!
//! ```
//! use sheetquery_query::{Condition, Mode, Operator, QueryEngine, QueryPlan};
//! use sheetquery_sheet::{Book, JoinType, Sheet};
//!
//! let mut book = Book::new();
//! book.add_sheet("Orders", Sheet::from_csv_str("id,qty\n1,5\n2,7\n").unwrap()).unwrap();
//! book.add_sheet("Customers", Sheet::from_csv_str("id,name\n1,Ann\n2,Bo\n").unwrap()).unwrap();
//!
//! let plan = QueryPlan::new(&["Orders", "Customers"])
//!     .with_mode(Mode::Merge)
//!     .with_join_type(JoinType::Left)
//!     .with_condition(Condition::new("qty", Operator::Greater, "6"));
//!
//! let result = QueryEngine::new(&book).execute(&plan).unwrap();
//! assert_eq!(result.table.row_count(), 1);
//! assert_eq!(result.table.get_by_name(0, "name").unwrap().as_str(), "Bo");
//! ```
//!
//! Interactive front ends drive a [`QuerySession`], which tracks the
//! [`ExecutionState`] between edits and executions.

mod classify;
mod combine;
mod condition;
mod config;
mod contradiction;
mod engine;
mod evaluate;
mod merge;
mod progress;
mod project;
mod report;
mod session;
mod stack;

pub use classify::{classify, parse_datetime, ColumnKind, DATE_FORMATS};
pub use combine::{CombineStatus, Combined, ConditionCombiner};
pub use condition::{
    Condition, DisplayField, Logic, Mode, Operator, ParseKeywordError, QueryPlan, SHOW_ALL,
};
pub use config::QueryConfig;
pub use contradiction::{find_contradictions, Contradiction};
pub use engine::QueryEngine;
pub use evaluate::{evaluate, ConditionEvaluator, EvalError, DEFAULT_DATE_SAMPLE};
pub use merge::{MergeCombiner, Merged};
pub use progress::{ProgressCallback, ProgressObserver};
pub use project::project;
pub use report::{Diagnostic, QueryFailure, QueryResult, ReportKind, Severity};
pub use session::{ExecutionState, QuerySession};
pub use stack::{stack, tag_provenance, StackCombiner, Stacked};
