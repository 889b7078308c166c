//! Column type classification and date parsing.
//!
//! A column is classified once per evaluation, then every operator dispatches
//! on the result instead of retrying conversions cell by cell.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use sheetquery_sheet::CellValue;

/// Date formats tried in order; the first one that fits wins.
/// Day-first comes before month-first, so `01/02/2024` is 1 February.
pub const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y",
    "%m-%d-%Y",
];

/// Formats tried after `DATE_FORMATS` when parsing a single value
const EXTRA_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y%m%d", "%Y.%m.%d", "%Y/%m/%d %H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every non-null value is a number
    Numeric,
    /// Declared dates, or mostly strings in one date format
    DateTime { format: Option<&'static str> },
    Text,
}

/// Classify a column from its cells.
///
/// Declared date cells win; then all-numeric columns; then a column whose
/// sampled non-null values mostly (more than half) parse with one of the
/// date formats.
pub fn classify<'a, I>(cells: I, sample_size: usize) -> ColumnKind
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let values: Vec<&CellValue> = cells.into_iter().filter(|c| !c.is_null()).collect();
    if values.is_empty() {
        return ColumnKind::Text;
    }

    if values.iter().all(|c| matches!(c, CellValue::DateTime(_))) {
        return ColumnKind::DateTime { format: None };
    }

    if values.iter().all(|c| c.as_float().is_some()) {
        return ColumnKind::Numeric;
    }

    let sample: Vec<String> = values
        .iter()
        .take(sample_size.max(1))
        .map(|c| c.as_str().trim().to_string())
        .collect();

    for format in DATE_FORMATS {
        let parsed = sample
            .iter()
            .filter(|s| parse_with_format(s, format).is_some())
            .count();
        if parsed * 2 > sample.len() {
            return ColumnKind::DateTime {
                format: Some(format),
            };
        }
    }

    ColumnKind::Text
}

/// Parse `s` with one format; date-only formats yield midnight
pub fn parse_with_format(s: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, format)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Best-effort parse of a user-supplied date: the fixed format list first,
/// then a few common ISO-like spellings.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .chain(EXTRA_FORMATS.iter())
        .find_map(|format| parse_with_format(s, format))
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

/// Date/time value of a cell in a column classified as dates
pub fn cell_datetime(cell: &CellValue, format: Option<&str>) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Null => None,
        CellValue::DateTime(dt) => Some(*dt),
        other => {
            let text = other.as_str();
            let text = text.trim();
            format
                .and_then(|f| parse_with_format(text, f))
                .or_else(|| parse_datetime(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|s| CellValue::parse(s)).collect()
    }

    #[test]
    fn test_numeric_column() {
        let cells = strings(&["1", "2.5", "", "-3"]);
        assert_eq!(classify(&cells, 100), ColumnKind::Numeric);
    }

    #[test]
    fn test_mixed_column_is_text() {
        let cells = strings(&["1", "two", "3"]);
        assert_eq!(classify(&cells, 100), ColumnKind::Text);
    }

    #[test]
    fn test_all_null_column_is_text() {
        let cells = vec![CellValue::Null, CellValue::Null];
        assert_eq!(classify(&cells, 100), ColumnKind::Text);
    }

    #[test]
    fn test_date_majority() {
        let cells = strings(&["2024-01-05", "2024-02-10", "n/a"]);
        assert_eq!(
            classify(&cells, 100),
            ColumnKind::DateTime {
                format: Some("%Y-%m-%d")
            }
        );

        let cells = strings(&["2024-01-05", "n/a"]);
        assert_eq!(classify(&cells, 100), ColumnKind::Text);
    }

    #[test]
    fn test_first_matching_format_wins() {
        let cells = strings(&["01/02/2024", "03/04/2024"]);
        assert_eq!(
            classify(&cells, 100),
            ColumnKind::DateTime {
                format: Some("%d/%m/%Y")
            }
        );
    }

    #[test]
    fn test_declared_dates() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let cells = vec![CellValue::DateTime(dt), CellValue::Null];
        assert_eq!(classify(&cells, 100), ColumnKind::DateTime { format: None });
    }

    #[test]
    fn test_sample_size_limits_inspection() {
        let cells = strings(&["2024-01-01", "x", "y", "z"]);
        assert_eq!(
            classify(&cells, 1),
            ColumnKind::DateTime {
                format: Some("%Y-%m-%d")
            }
        );
    }

    #[test]
    fn test_parse_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for s in ["2024-03-09", "09/03/2024", "2024/03/09", "20240309", "2024.03.09"] {
            assert_eq!(parse_datetime(s).map(|d| d.date()), Some(expected), "{s}");
        }
        let with_time = parse_datetime("2024-03-09 13:45:00").unwrap();
        assert_eq!(with_time.time(), NaiveTime::from_hms_opt(13, 45, 0).unwrap());
        assert!(parse_datetime("next tuesday").is_none());
    }
}
