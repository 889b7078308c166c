//! Display projection: pick, order and relabel result columns.

use crate::condition::{split_qualified, DisplayField};
use crate::report::Diagnostic;
use sheetquery_sheet::{Result, Sheet};

/// Columns of `table` a display field refers to, in table order.
///
/// An exact name wins outright for qualified fields. Otherwise a field
/// matches its own name plus every `<column>_<suffix>` collision variant;
/// `<sheet>.<column>` matches `<column>_<sheet>`, else `<column>`.
fn matching_columns(table: &Sheet, field: &DisplayField, sheets: &[String]) -> Vec<String> {
    let column = field.column.trim();

    if !table.has_column(column) {
        if let Some((sheet, bare)) = split_qualified(column, sheets) {
            let suffixed = format!("{bare}_{sheet}");
            return [suffixed, bare]
                .into_iter()
                .find(|c| table.has_column(c))
                .into_iter()
                .collect();
        }
    }

    let prefix = format!("{column}_");
    table
        .column_names()
        .iter()
        .filter(|c| *c == column || c.starts_with(&prefix))
        .cloned()
        .collect()
}

/// New name for `matched` under `label`: a lone or exact match takes the
/// label, a collision variant keeps its suffix.
fn relabel(field: &DisplayField, matched: &str, lone: bool) -> String {
    let Some(label) = &field.label else {
        return matched.to_string();
    };
    let base = field.column.trim();
    if lone || matched == base {
        return label.clone();
    }
    match matched.strip_prefix(base) {
        Some(suffix) => format!("{label}{suffix}"),
        None => label.clone(),
    }
}

/// Project `table` onto `fields`.
///
/// An empty field list or the show-all sentinel keeps every column. Fields
/// that match nothing are warned about; when none match, every column is
/// kept. The provenance column, if present, always ends up leftmost.
pub fn project(
    table: &Sheet,
    fields: &[DisplayField],
    provenance: &str,
    sheets: &[String],
) -> Result<(Sheet, Vec<Diagnostic>)> {
    let mut diagnostics = Vec::new();
    let mut picked: Vec<(String, String)> = Vec::new();

    let show_all = fields.is_empty() || fields.iter().any(DisplayField::is_all);
    if !show_all {
        for field in fields {
            let matches = matching_columns(table, field, sheets);
            if matches.is_empty() {
                diagnostics.push(Diagnostic::warning(format!(
                    "display column '{}' not found in the result",
                    field.column
                )));
                continue;
            }
            let lone = matches.len() == 1;
            for matched in matches {
                if picked.iter().any(|(c, _)| *c == matched) {
                    continue;
                }
                let name = relabel(field, &matched, lone);
                picked.push((matched, name));
            }
        }

        if picked.is_empty() {
            diagnostics.push(Diagnostic::warning(
                "none of the display columns were found; showing all columns",
            ));
        }
    }

    if picked.is_empty() {
        picked = table
            .column_names()
            .iter()
            .map(|c| (c.clone(), c.clone()))
            .collect();
    }

    picked.retain(|(c, _)| c != provenance);
    if table.has_column(provenance) {
        picked.insert(0, (provenance.to_string(), provenance.to_string()));
    }

    let mut projected = table.clone();
    let order: Vec<&str> = picked.iter().map(|(c, _)| c.as_str()).collect();
    projected.select_columns(&order)?;

    for (column, name) in &picked {
        if column == name {
            continue;
        }
        if let Err(e) = projected.rename_column(column, name) {
            diagnostics.push(Diagnostic::warning(format!(
                "cannot show '{column}' as '{name}': {e}"
            )));
        }
    }

    Ok((projected, diagnostics))
}
