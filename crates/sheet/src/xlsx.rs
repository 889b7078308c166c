use crate::book::{Book, LoadDiagnostic, LoadOptions};
use crate::cell::CellValue;
use crate::csv::RawRows;
use crate::error::{Result, SheetError};
use crate::sheet::Sheet;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Convert calamine Data to CellValue
fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(format!("#ERROR: {e:?}")),
    }
}

impl Book {
    /// Load every sheet of a workbook (xlsx, xlsm, xlsb, xls, ods).
    ///
    /// Failing to open the file is an error. A sheet that cannot be read is
    /// skipped and recorded as a load diagnostic; so is row truncation.
    pub fn from_workbook<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook =
            open_workbook_auto(path).map_err(|e| SheetError::Workbook(e.to_string()))?;

        let mut book = Book::with_name(
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Book1"),
        );

        for sheet_name in workbook.sheet_names() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(sheet = %sheet_name, error = %e, "skipping unreadable sheet");
                    book.push_diagnostic(LoadDiagnostic::failed(&sheet_name, e.to_string()));
                    continue;
                }
            };

            let mut rows = range
                .rows()
                .map(|row| row.iter().map(data_to_cell_value).collect::<Vec<_>>());

            let header = if options.has_headers {
                rows.next().unwrap_or_default()
            } else {
                (0..range.width())
                    .map(|i| CellValue::String(i.to_string()))
                    .collect()
            };
            let rows: Vec<Vec<CellValue>> = rows.collect();

            let sheet = Sheet::from_raw_rows(&sheet_name, RawRows { header, rows })?;
            book.add_loaded_sheet(sheet, options)?;
        }

        Ok(book)
    }
}
