//! Sheet/Book tables for sheetquery
//!
//! A [`Book`] holds the named [`Sheet`]s of one workbook. Sheets have
//! uniquely named columns over row-major [`CellValue`] storage and are never
//! modified by queries: filtering, joining and column alignment all return
//! new sheets.
//!
//! # Examples
//!
//! ## Creating a sheet from data
//!
//! ```
//! use sheetquery_sheet::{Sheet, CellValue};
//!
//! let sheet = Sheet::from_data(vec![
//!     vec!["Name", "Age", "City"],
//!     vec!["Alice", "30", "NYC"],
//!     vec!["Bob", "25", "LA"],
//! ]).unwrap();
//!
//! assert_eq!(sheet.row_count(), 2);
//! assert_eq!(sheet.col_count(), 3);
//! assert_eq!(sheet.get_by_name(1, "City").unwrap(), &CellValue::from("LA"));
//! ```
//!
//! ## Filtering with a row mask
//!
//! ```
//! use sheetquery_sheet::{RowMask, Sheet};
//!
//! let sheet = Sheet::from_csv_str("id,qty\n1,5\n2,0\n").unwrap();
//! let mask: RowMask = sheet
//!     .column_values("qty")
//!     .unwrap()
//!     .map(|cell| cell.as_float() > Some(0.0))
//!     .collect();
//! let filtered = sheet.filter_by_mask(&mask).unwrap();
//! assert_eq!(filtered.row_count(), 1);
//! ```
//!
//! ## Loading a workbook
//!
//! ```no_run
//! use sheetquery_sheet::{Book, LoadOptions};
//!
//! let book = Book::load_with_options("sales.xlsx", &LoadOptions::default()).unwrap();
//! for diagnostic in book.diagnostics() {
//!     eprintln!("{diagnostic}");
//! }
//! ```

mod book;
mod cell;
mod csv;
mod error;
mod join;
mod mask;
mod sheet;
mod xlsx;

/// Re-export book types and options.
pub use book::{Book, LoadDiagnostic, LoadIssue, LoadOptions, DEFAULT_MAX_ROWS};
/// Re-export cell value type.
pub use cell::{parse_number, CellValue};
/// Re-export CSV options.
pub use csv::CsvOptions;
/// Re-export sheet error types.
pub use error::{Result, SheetError};
/// Re-export join type.
pub use join::JoinType;
/// Re-export row mask.
pub use mask::RowMask;
/// Re-export sheet type.
pub use sheet::Sheet;
