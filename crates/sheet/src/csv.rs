use crate::book::{header_names, LoadOptions};
use crate::cell::CellValue;
use crate::error::Result;
use crate::sheet::Sheet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// CSV reader/writer options
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Whether the first row contains headers
    pub has_headers: bool,
    /// Quote character (default: '"')
    pub quote: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            has_headers: true,
            quote: b'"',
        }
    }
}

impl CsvOptions {
    /// Create options for TSV (tab-separated values)
    #[must_use]
    pub fn tsv() -> Self {
        CsvOptions {
            delimiter: b'\t',
            ..Default::default()
        }
    }

    /// Set whether the first row contains headers
    #[must_use]
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
}

impl From<&LoadOptions> for CsvOptions {
    fn from(options: &LoadOptions) -> Self {
        CsvOptions::default().with_headers(options.has_headers)
    }
}

/// Rows read from a delimited source before they become a sheet
pub(crate) struct RawRows {
    pub(crate) header: Vec<CellValue>,
    pub(crate) rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Load a sheet from a CSV file with custom options.
    /// The sheet is named after the file stem.
    pub fn from_csv_with_options<P: AsRef<Path>>(path: P, options: CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut sheet = Self::from_csv_reader(BufReader::new(file), options)?;
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            sheet.set_name(stem);
        }
        Ok(sheet)
    }

    /// Load a sheet from a CSV string
    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_csv_reader(content.as_bytes(), CsvOptions::default())
    }

    /// Load a sheet from a reader
    pub fn from_csv_reader<R: Read>(reader: R, options: CsvOptions) -> Result<Self> {
        let raw = read_csv_rows(reader, &options)?;
        Sheet::from_raw_rows("Sheet1", raw)
    }

    pub(crate) fn from_raw_rows(name: &str, raw: RawRows) -> Result<Self> {
        let columns = header_names(&raw.header);
        // readers widen the header to the longest row, so no cell is cut
        let width = columns.len();
        let mut sheet = Sheet::with_columns(name, columns)?;
        for mut row in raw.rows {
            row.resize(width, CellValue::Null);
            sheet.push_raw_row(row);
        }
        Ok(sheet)
    }

    /// Write the sheet, header first, to a writer as CSV
    pub fn write_csv<W: Write>(&self, writer: W, options: &CsvOptions) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .from_writer(writer);

        if options.has_headers {
            csv_writer.write_record(self.column_names())?;
        }
        for row in self.rows() {
            let record: Vec<String> = row.iter().map(CellValue::as_str).collect();
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn read_csv_rows<R: Read>(reader: R, options: &CsvOptions) -> Result<RawRows> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .has_headers(false) // We handle headers ourselves
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(record.iter().map(CellValue::parse).collect());
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let header = if options.has_headers && !rows.is_empty() {
        let mut header = rows.remove(0);
        header.resize(width, CellValue::Null);
        header
    } else {
        (0..width).map(|i| CellValue::String(i.to_string())).collect()
    };

    Ok(RawRows { header, rows })
}
