use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::mask::RowMask;
use indexmap::IndexMap;
use std::collections::HashMap;

/// A named table: ordered, uniquely named columns over row-major cell storage.
///
/// Every row holds exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    data: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Create a new empty sheet
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("Sheet1")
    }

    /// Create a new empty sheet with a name
    #[must_use]
    pub fn with_name(name: &str) -> Self {
        Sheet {
            name: name.to_string(),
            columns: Vec::new(),
            column_index: HashMap::new(),
            data: Vec::new(),
        }
    }

    /// Create an empty sheet with the given columns
    pub fn with_columns<S: Into<String>>(name: &str, columns: Vec<S>) -> Result<Self> {
        let mut sheet = Sheet::with_name(name);
        for column in columns {
            sheet.push_column_name(column.into())?;
        }
        Ok(sheet)
    }

    /// Create a sheet from a 2D vector whose first row holds the column names
    pub fn from_data<T: Into<CellValue>>(data: Vec<Vec<T>>) -> Result<Self> {
        let mut rows = data.into_iter();
        let header: Vec<String> = rows
            .next()
            .map(|row| row.into_iter().map(|c| c.into().as_str()).collect())
            .unwrap_or_default();

        let mut sheet = Sheet::with_columns("Sheet1", header)?;
        for row in rows {
            sheet.row_append(row)?;
        }
        Ok(sheet)
    }

    /// Create a sheet with the same name and columns but no rows
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Sheet {
            name: self.name.clone(),
            columns: self.columns.clone(),
            column_index: self.column_index.clone(),
            data: Vec::new(),
        }
    }

    /// Get the sheet name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Get the number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Get the number of columns
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the sheet has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column names in order
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Position of a column, if present
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    fn column_index_by_name(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SheetError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    // ===== Cell Access =====

    /// Get a cell value by row and column index (0-based)
    pub fn get(&self, row: usize, col: usize) -> Result<&CellValue> {
        self.data
            .get(row)
            .and_then(|r| r.get(col))
            .ok_or(SheetError::IndexOutOfBounds {
                row,
                col,
                rows: self.row_count(),
                cols: self.col_count(),
            })
    }

    /// Get a cell value by row index and column name
    pub fn get_by_name(&self, row: usize, col_name: &str) -> Result<&CellValue> {
        let col = self.column_index_by_name(col_name)?;
        self.get(row, col)
    }

    /// Iterate over the cells of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &CellValue> + '_> {
        let col = self.column_index_by_name(name)?;
        Ok(self.data.iter().map(move |row| &row[col]))
    }

    // ===== Row Operations =====

    /// Get a row by index
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.data.get(index).map(Vec::as_slice)
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &Vec<CellValue>> {
        self.data.iter()
    }

    /// Access the raw row-major data
    #[must_use]
    pub fn data(&self) -> &Vec<Vec<CellValue>> {
        &self.data
    }

    /// Append a row; its length must equal the column count
    pub fn row_append<T: Into<CellValue>>(&mut self, data: Vec<T>) -> Result<()> {
        if data.len() != self.col_count() {
            return Err(SheetError::LengthMismatch {
                expected: self.col_count(),
                actual: data.len(),
            });
        }
        self.data.push(data.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Keep only rows for which the predicate returns true
    pub fn filter_rows<F>(&mut self, predicate: F)
    where
        F: Fn(&[CellValue]) -> bool,
    {
        self.data.retain(|row| predicate(row));
    }

    /// Keep at most `len` rows
    pub fn truncate_rows(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Return a copy holding only the rows selected by `mask`
    pub fn filter_by_mask(&self, mask: &RowMask) -> Result<Sheet> {
        if mask.len() != self.row_count() {
            return Err(SheetError::MaskLengthMismatch {
                sheet: self.name.clone(),
                expected: self.row_count(),
                actual: mask.len(),
            });
        }

        let mut result = self.empty_like();
        result.data = self
            .data
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| *keep)
            .map(|(row, _)| row.clone())
            .collect();
        Ok(result)
    }

    /// Remove rows whose cells are all null, ignoring the listed columns.
    /// Returns the number of rows removed.
    pub fn remove_null_rows(&mut self, ignore: &[&str]) -> usize {
        let checked: Vec<usize> = (0..self.col_count())
            .filter(|i| !ignore.contains(&self.columns[*i].as_str()))
            .collect();
        if checked.is_empty() {
            return 0;
        }

        let before = self.row_count();
        self.filter_rows(|row| !checked.iter().all(|&i| row[i].is_null()));
        before - self.row_count()
    }

    // ===== Column Operations =====

    /// Append a column at the right edge
    pub fn column_append<T: Into<CellValue>>(&mut self, name: &str, data: Vec<T>) -> Result<()> {
        self.column_insert(self.col_count(), name, data)
    }

    /// Insert a column at `index`, shifting later columns right
    pub fn column_insert<T: Into<CellValue>>(
        &mut self,
        index: usize,
        name: &str,
        data: Vec<T>,
    ) -> Result<()> {
        if self.has_column(name) {
            return Err(SheetError::DuplicateColumnName {
                name: name.to_string(),
            });
        }
        if data.len() != self.row_count() {
            return Err(SheetError::LengthMismatch {
                expected: self.row_count(),
                actual: data.len(),
            });
        }
        if index > self.col_count() {
            return Err(SheetError::IndexOutOfBounds {
                row: 0,
                col: index,
                rows: self.row_count(),
                cols: self.col_count(),
            });
        }

        self.columns.insert(index, name.to_string());
        for (row, value) in self.data.iter_mut().zip(data) {
            row.insert(index, value.into());
        }
        self.rebuild_column_index();
        Ok(())
    }

    /// Insert a column holding the same value on every row
    pub fn column_insert_constant(
        &mut self,
        index: usize,
        name: &str,
        value: &CellValue,
    ) -> Result<()> {
        let values = vec![value.clone(); self.row_count()];
        self.column_insert(index, name, values)
    }

    /// Rename a column in place
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let idx = self.column_index_by_name(old)?;
        if self.has_column(new) {
            return Err(SheetError::DuplicateColumnName {
                name: new.to_string(),
            });
        }
        self.columns[idx] = new.to_string();
        self.rebuild_column_index();
        Ok(())
    }

    /// Cherry-pick columns: keep only the specified columns, in the given order
    pub fn select_columns(&mut self, columns: &[&str]) -> Result<()> {
        let indices = columns
            .iter()
            .map(|name| self.column_index_by_name(name))
            .collect::<Result<Vec<usize>>>()?;

        for row in &mut self.data {
            let new_row: Vec<CellValue> = indices.iter().map(|&i| row[i].clone()).collect();
            *row = new_row;
        }

        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self.rebuild_column_index();
        Ok(())
    }

    // ===== Conversion =====

    /// Convert rows to records keyed by column name
    #[must_use]
    pub fn to_records(&self) -> Vec<IndexMap<String, CellValue>> {
        self.data
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub(crate) fn push_raw_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.col_count());
        self.data.push(row);
    }

    fn push_column_name(&mut self, name: String) -> Result<()> {
        if self.column_index.contains_key(&name) {
            return Err(SheetError::DuplicateColumnName { name });
        }
        self.column_index.insert(name.clone(), self.columns.len());
        self.columns.push(name);
        for row in &mut self.data {
            row.push(CellValue::Null);
        }
        Ok(())
    }

    // Helper to rebuild column index after modifications
    fn rebuild_column_index(&mut self) {
        self.column_index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}
