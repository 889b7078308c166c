use thiserror::Error;

/// Errors that can occur during sheet operations
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Index out of bounds: row {row}, col {col} (sheet has {rows} rows, {cols} cols)")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    #[error("Sheet not found: {name}")]
    SheetNotFound { name: String },

    #[error("Sheet already exists: {name}")]
    SheetAlreadyExists { name: String },

    #[error("Duplicate column name: {name}")]
    DuplicateColumnName { name: String },

    #[error("Data length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Row mask has {actual} entries but sheet '{sheet}' has {expected} rows")]
    MaskLengthMismatch {
        sheet: String,
        expected: usize,
        actual: usize,
    },

    #[error("Key column '{key}' not found in {sheet}")]
    JoinKeyNotFound { key: String, sheet: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SheetError>;
