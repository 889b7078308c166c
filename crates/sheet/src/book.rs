use crate::cell::CellValue;
use crate::csv::CsvOptions;
use crate::error::{Result, SheetError};
use crate::sheet::Sheet;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Default cap on data rows read from one sheet
pub const DEFAULT_MAX_ROWS: usize = 100_000;

/// A book containing multiple sheets (preserves insertion order).
///
/// Sheets are read-only once loaded; query operations produce new sheets.
#[derive(Debug, Clone)]
pub struct Book {
    name: String,
    sheets: IndexMap<String, Sheet>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl Book {
    /// Create a new empty book
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("Book1")
    }

    /// Create a new empty book with a name
    #[must_use]
    pub fn with_name(name: &str) -> Self {
        Book {
            name: name.to_string(),
            sheets: IndexMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Load a file, choosing the reader from its extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_options(path, &LoadOptions::default())
    }

    /// Load a file with options.
    ///
    /// CSV/TSV files become a single sheet named after the file stem.
    /// Workbooks contribute one sheet per worksheet.
    pub fn load_with_options<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let book = match ext.as_str() {
            "csv" | "tsv" => {
                let csv_options = if ext == "tsv" {
                    CsvOptions::tsv().with_headers(options.has_headers)
                } else {
                    CsvOptions::from(options)
                };
                let sheet = Sheet::from_csv_with_options(path, csv_options)?;
                let mut book = Book::with_name(sheet.name());
                book.add_loaded_sheet(sheet, options)?;
                book
            }
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Book::from_workbook(path, options)?,
            _ => {
                return Err(SheetError::Parse(format!(
                    "Unsupported file format: '{ext}'. Supported: csv, tsv, xlsx, xlsm, xlsb, xls, ods"
                )))
            }
        };

        tracing::debug!(
            path = %path.display(),
            sheets = book.sheet_count(),
            diagnostics = book.diagnostics.len(),
            "loaded book"
        );
        Ok(book)
    }

    /// Get the book name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of sheets
    #[must_use]
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Check if the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Get all sheet names in order
    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    /// Check if a sheet exists
    #[must_use]
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    // ===== Sheet Access =====

    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .get(name)
            .ok_or_else(|| SheetError::SheetNotFound {
                name: name.to_string(),
            })
    }

    /// Column names of a sheet, in order
    pub fn columns_of(&self, name: &str) -> Result<&[String]> {
        Ok(self.get_sheet(name)?.column_names())
    }

    /// Add a sheet to the book; the sheet takes the given name
    pub fn add_sheet(&mut self, name: &str, mut sheet: Sheet) -> Result<()> {
        if self.sheets.contains_key(name) {
            return Err(SheetError::SheetAlreadyExists {
                name: name.to_string(),
            });
        }
        sheet.set_name(name);
        self.sheets.insert(name.to_string(), sheet);
        Ok(())
    }

    /// Iterate over sheets
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &Sheet)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Problems met while loading: truncated or unreadable sheets
    #[must_use]
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: LoadDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Apply the row cap, then store the sheet under a unique name
    pub(crate) fn add_loaded_sheet(&mut self, mut sheet: Sheet, options: &LoadOptions) -> Result<()> {
        if let Some(max_rows) = options.max_rows_per_sheet {
            let total = sheet.row_count();
            if total > max_rows {
                sheet.truncate_rows(max_rows);
                tracing::warn!(sheet = sheet.name(), total, kept = max_rows, "truncated sheet");
                self.push_diagnostic(LoadDiagnostic {
                    sheet: sheet.name().to_string(),
                    kind: LoadIssue::Truncated {
                        kept: max_rows,
                        total,
                    },
                });
            }
        }

        let name = get_unique_name(self, sheet.name());
        self.add_sheet(&name, sheet)
    }

    // ===== Schema helpers =====

    /// Columns present in every given sheet, in the first sheet's order.
    /// Empty input yields an empty list.
    #[must_use]
    pub fn common_columns(sheets: &[&Sheet]) -> Vec<String> {
        let Some((first, rest)) = sheets.split_first() else {
            return Vec::new();
        };
        first
            .column_names()
            .iter()
            .filter(|col| rest.iter().all(|s| s.has_column(col)))
            .cloned()
            .collect()
    }

    /// Give every sheet the union of all columns.
    ///
    /// Each sheet keeps its own column order; columns it lacks are appended
    /// in first-seen order and filled with nulls.
    pub fn align_columns(sheets: &[Sheet]) -> Result<Vec<Sheet>> {
        let all_columns: IndexSet<&str> = sheets
            .iter()
            .flat_map(|s| s.column_names().iter().map(String::as_str))
            .collect();

        sheets
            .iter()
            .map(|sheet| {
                let mut aligned = sheet.clone();
                for col in &all_columns {
                    if !aligned.has_column(col) {
                        aligned.column_append(col, vec![CellValue::Null; aligned.row_count()])?;
                    }
                }
                Ok(aligned)
            })
            .collect()
    }
}

/// Options for loading files
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Whether the first row holds column names (default: true)
    pub has_headers: bool,
    /// Data rows kept per sheet; `None` keeps everything
    pub max_rows_per_sheet: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            max_rows_per_sheet: Some(DEFAULT_MAX_ROWS),
        }
    }
}

impl LoadOptions {
    /// Set whether files have headers
    #[must_use]
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Set the per-sheet row cap
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows_per_sheet = max_rows;
        self
    }
}

/// A non-fatal problem met while loading one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDiagnostic {
    pub sheet: String,
    pub kind: LoadIssue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadIssue {
    /// Only the first `kept` of `total` data rows were loaded
    Truncated { kept: usize, total: usize },
    /// The sheet could not be read and was skipped
    Failed { reason: String },
}

impl LoadDiagnostic {
    pub(crate) fn failed(sheet: &str, reason: String) -> Self {
        LoadDiagnostic {
            sheet: sheet.to_string(),
            kind: LoadIssue::Failed { reason },
        }
    }
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoadIssue::Truncated { kept, total } => write!(
                f,
                "sheet '{}' has {total} rows; only the first {kept} were loaded",
                self.sheet
            ),
            LoadIssue::Failed { reason } => {
                write!(f, "sheet '{}' could not be read: {reason}", self.sheet)
            }
        }
    }
}

/// Turn a header row into unique column names.
///
/// Blank cells become `Unnamed: <position>`; repeats of a name get `.1`,
/// `.2`, ... appended.
pub(crate) fn header_names(header: &[CellValue]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = if cell.is_blank() {
                format!("Unnamed: {i}")
            } else {
                cell.as_str().trim().to_string()
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while seen.contains(&name) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

/// Generate a unique sheet name by appending _1, _2, etc.
fn get_unique_name(book: &Book, base_name: &str) -> String {
    if !book.has_sheet(base_name) {
        return base_name.to_string();
    }
    let mut suffix = 1;
    loop {
        let new_name = format!("{base_name}_{suffix}");
        if !book.has_sheet(&new_name) {
            return new_name;
        }
        suffix += 1;
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(columns: &[&str], rows: usize) -> Sheet {
        let mut sheet = Sheet::with_columns("s", columns.to_vec()).unwrap();
        for r in 0..rows {
            let row: Vec<CellValue> = (0..columns.len())
                .map(|c| CellValue::Int((r * 10 + c) as i64))
                .collect();
            sheet.row_append(row).unwrap();
        }
        sheet
    }

    #[test]
    fn test_get_sheet_not_found() {
        let book = Book::new();
        assert!(matches!(
            book.get_sheet("missing"),
            Err(SheetError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn test_add_sheet_renames_sheet() {
        let mut book = Book::new();
        book.add_sheet("Sales", sheet(&["a"], 1)).unwrap();
        assert_eq!(book.get_sheet("Sales").unwrap().name(), "Sales");
        assert!(book.add_sheet("Sales", Sheet::new()).is_err());
        assert_eq!(book.columns_of("Sales").unwrap(), &["a"]);
    }

    #[test]
    fn test_common_columns_in_first_order() {
        let a = sheet(&["id", "name", "qty"], 0);
        let b = sheet(&["qty", "id"], 0);
        assert_eq!(Book::common_columns(&[&a, &b]), vec!["id", "qty"]);
        assert!(Book::common_columns(&[]).is_empty());
    }

    #[test]
    fn test_align_columns_appends_missing() {
        let a = sheet(&["id", "name"], 1);
        let b = sheet(&["qty", "id"], 2);
        let aligned = Book::align_columns(&[a, b]).unwrap();
        assert_eq!(aligned[0].column_names(), &["id", "name", "qty"]);
        assert_eq!(aligned[1].column_names(), &["qty", "id", "name"]);
        assert_eq!(aligned[1].get_by_name(1, "name").unwrap(), &CellValue::Null);
    }

    #[test]
    fn test_truncation_is_reported() {
        let mut book = Book::new();
        let options = LoadOptions::default().with_max_rows(Some(2));
        book.add_loaded_sheet(sheet(&["a"], 5), &options).unwrap();
        assert_eq!(book.get_sheet("s").unwrap().row_count(), 2);
        assert_eq!(
            book.diagnostics()[0].kind,
            LoadIssue::Truncated { kept: 2, total: 5 }
        );
    }

    #[test]
    fn test_header_names() {
        let header = vec![
            CellValue::from("a"),
            CellValue::Null,
            CellValue::from("a"),
            CellValue::from("a"),
            CellValue::Int(7),
        ];
        assert_eq!(
            header_names(&header),
            vec!["a", "Unnamed: 1", "a.1", "a.2", "7"]
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let result = Book::load("notes.txt");
        assert!(matches!(result, Err(SheetError::Parse(_))));
    }
}
