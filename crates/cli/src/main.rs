//! # sheetquery-cli
//!
//! Command-line front end: load a workbook, filter, stack or merge its
//! sheets and print the result.

mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use config::AppConfig;
use regex::Regex;
use sheetquery_query::{
    Condition, Diagnostic, DisplayField, Logic, Mode, Operator, QueryEngine, QueryFailure,
    QueryPlan, Severity,
};
use sheetquery_sheet::{Book, CellValue, CsvOptions, JoinType, Sheet};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// sq - filter, stack and merge spreadsheet sheets
#[derive(Parser)]
#[command(name = "sq")]
#[command(author, version, about = "Query multi-sheet spreadsheets", long_about = None)]
struct Cli {
    /// Workbook to read (.xlsx, .xlsm, .xlsb, .xls, .ods, .csv, .tsv)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Sheet to query (repeatable); every sheet when omitted
    #[arg(short = 's', long = "sheet", value_name = "NAME")]
    sheets: Vec<String>,

    /// How selected sheets are combined
    #[arg(short = 'm', long = "mode")]
    mode: Option<ModeArg>,

    /// Condition `[and|or|and not] COLUMN OPERATOR [VALUE]` (repeatable)
    #[arg(short = 'w', long = "where", value_name = "CONDITION")]
    conditions: Vec<String>,

    /// Column to show, `COLUMN` or `COLUMN=LABEL` (repeatable); `*` shows all
    #[arg(long = "show", value_name = "COLUMN")]
    show: Vec<String>,

    /// Merge key; defaults to the first column every sheet shares
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Join type used when merging
    #[arg(short = 'j', long = "join")]
    join: Option<JoinArg>,

    /// JSON query plan; other options are applied on top of it
    #[arg(short = 'p', long = "plan", value_name = "FILE")]
    plan: Option<PathBuf>,

    /// Output format (json, csv, tsv, table)
    #[arg(short = 'f', long = "format", default_value = "table")]
    format: OutputFormat,

    /// Config file; defaults to <config dir>/sheetquery/config.toml
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// List sheets and their columns, then exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output format for results.
#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// JSON records
    Json,
    /// CSV with a header row
    Csv,
    /// Tab-separated with a header row
    Tsv,
    /// Aligned table (default)
    #[default]
    Table,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    /// Stack rows of every sheet
    Stack,
    /// Join sheets on a key column
    Merge,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stack => Mode::Stack,
            ModeArg::Merge => Mode::Merge,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum JoinArg {
    Inner,
    Left,
    Outer,
}

impl From<JoinArg> for JoinType {
    fn from(join: JoinArg) -> Self {
        match join {
            JoinArg::Inner => JoinType::Inner,
            JoinArg::Left => JoinType::Left,
            JoinArg::Outer => JoinType::Outer,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let book = Book::load_with_options(&cli.file, &config.loader.load_options())
        .with_context(|| format!("Failed to load workbook: {}", cli.file.display()))?;

    for diagnostic in book.diagnostics() {
        eprintln!("{} {diagnostic}", "load warning:".yellow().bold());
    }

    if cli.list {
        print_sheet_list(&book);
        return Ok(());
    }

    let plan = build_plan(&cli, &book)?;
    let engine = QueryEngine::new(&book)
        .with_config(config.query)
        .with_progress(|percent: u8, status: &str| {
            tracing::debug!(percent, status, "progress");
        });

    match engine.execute(&plan) {
        Ok(result) => {
            print_notices(&result.notices);
            if result.fell_back {
                eprintln!("{}", "merge was not possible; sheets were stacked".yellow());
            }
            print_table(&result.table, cli.format)
        }
        Err(failure) => {
            print_failure(&failure);
            std::process::exit(1);
        }
    }
}

/// Parses `--where` expressions into conditions.
struct ConditionParser {
    pattern: Regex,
}

impl ConditionParser {
    fn new() -> Result<Self> {
        let mut operators: Vec<String> = Operator::iterator()
            .map(|op| op.as_str().replace(' ', r"[\s_-]+"))
            .chain(["!=", "<>", ">=", "<=", "==", "=", ">", "<"].map(regex::escape))
            .collect();
        // longest alternatives first so `greater or equal` wins over `greater`
        operators.sort_by_key(|op| std::cmp::Reverse(op.len()));

        let pattern = format!(
            r"(?i)^\s*(?:(and\s+not|and|or)\s+)?(.+?)\s+({})(?:\s+(.*?))?\s*$",
            operators.join("|")
        );
        Ok(ConditionParser {
            pattern: Regex::new(&pattern).context("Invalid condition pattern")?,
        })
    }

    fn parse(&self, expr: &str) -> Result<Condition> {
        let Some(caps) = self.pattern.captures(expr) else {
            bail!("Invalid condition: '{expr}'. Expected COLUMN OPERATOR [VALUE]");
        };

        let column = unquote(&caps[2]);
        let operator: Operator = caps[3].parse()?;
        let value = caps.get(4).map_or("", |m| m.as_str());

        if !operator.takes_value() && !value.is_empty() {
            bail!("Operator '{operator}' takes no value in '{expr}'");
        }
        if operator.takes_value() && value.is_empty() {
            bail!("Operator '{operator}' needs a value in '{expr}'");
        }

        let mut condition = Condition::new(column, operator, unquote(value));
        if let Some(logic) = caps.get(1) {
            condition = condition.with_logic(logic.as_str().parse::<Logic>()?);
        }
        Ok(condition)
    }
}

/// Strip one pair of surrounding double quotes
fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

/// `COLUMN` or `COLUMN=LABEL`
fn parse_display_field(spec: &str) -> DisplayField {
    match spec.split_once('=') {
        Some((column, label)) => DisplayField::new(column.trim()).with_label(label),
        None => DisplayField::new(spec.trim()),
    }
}

/// Start from `--plan` (if any) and apply the other options on top.
fn build_plan(cli: &Cli, book: &Book) -> Result<QueryPlan> {
    let mut plan = match &cli.plan {
        Some(path) => QueryPlan::load(path)
            .with_context(|| format!("Failed to read query plan: {}", path.display()))?,
        None => QueryPlan::default(),
    };

    for sheet in &cli.sheets {
        plan.select(sheet);
    }
    if plan.selected_sheets.is_empty() {
        for name in book.sheet_names() {
            plan.select(name);
        }
    }

    if let Some(mode) = cli.mode {
        plan.mode = mode.into();
    }
    if let Some(join) = cli.join {
        plan.join_type = Some(join.into());
    }
    if let Some(key) = &cli.key {
        plan.merge_key = Some(key.clone());
    }

    if !cli.conditions.is_empty() {
        let parser = ConditionParser::new()?;
        for expr in &cli.conditions {
            plan.conditions.push(parser.parse(expr)?);
        }
    }
    plan.display_fields
        .extend(cli.show.iter().map(|spec| parse_display_field(spec)));

    Ok(plan)
}

fn print_sheet_list(book: &Book) {
    for (name, sheet) in book.sheets() {
        println!(
            "{} {}",
            name.cyan().bold(),
            format!("({} rows)", sheet.row_count()).dimmed()
        );
        for column in sheet.column_names() {
            println!("  {column}");
        }
    }
}

fn print_notices(notices: &[Diagnostic]) {
    for notice in notices {
        let label = match notice.severity {
            Severity::Info => "info:".blue().bold(),
            Severity::Warning => "warning:".yellow().bold(),
            Severity::Error => "error:".red().bold(),
        };
        eprintln!("{label} {}", notice.message);
    }
}

fn print_failure(failure: &QueryFailure) {
    eprintln!("{} {}", "Error:".red().bold(), failure.kind.to_string().bold());
    for message in &failure.messages {
        eprintln!("  - {message}");
    }
}

/// Print the result table in the requested format.
fn print_table(table: &Sheet, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Table => {
            write!(out, "{}", render_table(table))?;
            writeln!(out, "{}", format!("({} rows)", table.row_count()).dimmed())?;
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&table.to_records())?)?;
        }
        OutputFormat::Csv => {
            table.write_csv(&mut out, &CsvOptions::default())?;
        }
        OutputFormat::Tsv => {
            table.write_csv(&mut out, &CsvOptions::tsv())?;
        }
    }
    Ok(())
}

/// Text of one cell in table output
fn display_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => String::new(),
        other => other.as_str(),
    }
}

/// Render the table with columns padded to their widest cell
fn render_table(table: &Sheet) -> String {
    let mut widths: Vec<usize> = table
        .column_names()
        .iter()
        .map(|c| c.chars().count())
        .collect();
    let rows: Vec<Vec<String>> = table
        .rows()
        .map(|row| row.iter().map(display_cell).collect())
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let header: Vec<String> = table
        .column_names()
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{name:<width$}"))
        .collect();
    output.push_str(&header.join(" | ").bold().to_string());
    output.push('\n');

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&rule.join("-+-"));
    output.push('\n');

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        output.push_str(cells.join(" | ").trim_end());
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // CLI parsing
    // ========================================================================

    #[test]
    fn test_cli_parse_file() {
        let cli = Cli::parse_from(["sq", "book.xlsx"]);
        assert_eq!(cli.file, PathBuf::from("book.xlsx"));
        assert!(cli.sheets.is_empty());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_query_options() {
        let cli = Cli::parse_from([
            "sq", "book.xlsx", "-s", "Orders", "--sheet", "Customers", "-m", "merge", "-j",
            "inner", "-k", "id", "-w", "qty > 5", "--show", "name=Customer", "-f", "json",
        ]);
        assert_eq!(cli.sheets, vec!["Orders", "Customers"]);
        assert!(matches!(cli.mode, Some(ModeArg::Merge)));
        assert!(matches!(cli.join, Some(JoinArg::Inner)));
        assert_eq!(cli.key.as_deref(), Some("id"));
        assert_eq!(cli.conditions, vec!["qty > 5"]);
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_tsv_output() {
        let cli = Cli::parse_from(["sq", "book.csv", "--format", "tsv"]);
        assert!(matches!(cli.format, OutputFormat::Tsv));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let cli = Cli::parse_from(["sq", "-v", "book.csv"]);
        assert!(cli.verbose);
    }

    // ========================================================================
    // Condition expressions
    // ========================================================================

    #[test]
    fn test_parse_word_operators() {
        let parser = ConditionParser::new().unwrap();

        let c = parser.parse("region contains east side").unwrap();
        assert_eq!(c.column, "region");
        assert_eq!(c.operator, Operator::Contains);
        assert_eq!(c.value, "east side");
        assert_eq!(c.logic, None);

        let c = parser.parse("amount greater or equal 10").unwrap();
        assert_eq!(c.operator, Operator::GreaterOrEqual);
        assert_eq!(c.value, "10");

        let c = parser.parse("note is not empty").unwrap();
        assert_eq!(c.operator, Operator::IsNotEmpty);
        assert!(c.value.is_empty());
    }

    #[test]
    fn test_parse_symbols_logic_and_quotes() {
        let parser = ConditionParser::new().unwrap();

        let c = parser.parse("OR Sales.amount >= 100").unwrap();
        assert_eq!(c.logic, Some(Logic::Or));
        assert_eq!(c.column, "Sales.amount");
        assert_eq!(c.operator, Operator::GreaterOrEqual);

        let c = parser.parse("and not \"unit price\" between \"1, 5\"").unwrap();
        assert_eq!(c.logic, Some(Logic::AndNot));
        assert_eq!(c.column, "unit price");
        assert_eq!(c.operator, Operator::Between);
        assert_eq!(c.value, "1, 5");

        let c = parser.parse("first name = Ann").unwrap();
        assert_eq!(c.column, "first name");
        assert_eq!(c.operator, Operator::Equals);
    }

    #[test]
    fn test_parse_rejects_bad_expressions() {
        let parser = ConditionParser::new().unwrap();
        assert!(parser.parse("just words").is_err());
        assert!(parser.parse("qty >").is_err());
        assert!(parser.parse("note is empty yes").is_err());
    }

    #[test]
    fn test_parse_display_field() {
        let field = parse_display_field("amount=Total");
        assert_eq!(field.column, "amount");
        assert_eq!(field.label.as_deref(), Some("Total"));

        let field = parse_display_field("*");
        assert!(field.is_all());
        assert_eq!(field.label, None);
    }

    // ========================================================================
    // Plans and output
    // ========================================================================

    fn book() -> Book {
        let mut book = Book::new();
        book.add_sheet("Orders", Sheet::from_csv_str("id,qty\n1,5\n").unwrap())
            .unwrap();
        book.add_sheet("Customers", Sheet::from_csv_str("id,name\n1,A\n").unwrap())
            .unwrap();
        book
    }

    #[test]
    fn test_build_plan_selects_every_sheet_by_default() {
        let cli = Cli::parse_from(["sq", "book.xlsx", "-w", "qty > 1", "--show", "qty"]);
        let plan = build_plan(&cli, &book()).unwrap();
        assert_eq!(plan.selected_sheets, vec!["Orders", "Customers"]);
        assert_eq!(plan.mode, Mode::Stack);
        assert_eq!(plan.conditions.len(), 1);
        assert_eq!(plan.display_fields, vec![DisplayField::new("qty")]);
    }

    #[test]
    fn test_build_plan_on_top_of_json_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"selected_sheets": ["Orders"], "mode": "merge"}"#).unwrap();

        let cli = Cli::parse_from([
            "sq",
            "book.xlsx",
            "--plan",
            path.to_str().unwrap(),
            "-s",
            "Customers",
            "-j",
            "left",
        ]);
        let plan = build_plan(&cli, &book()).unwrap();
        assert_eq!(plan.selected_sheets, vec!["Orders", "Customers"]);
        assert_eq!(plan.mode, Mode::Merge);
        assert_eq!(plan.join_type, Some(JoinType::Left));
    }

    #[test]
    fn test_render_table_pads_columns() {
        colored::control::set_override(false);
        let sheet = Sheet::from_csv_str("id,name\n1,Alice\n22,\n").unwrap();
        let rendered = render_table(&sheet);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id | name ");
        assert_eq!(lines[1], "---+------");
        assert_eq!(lines[2], "1  | Alice");
        assert_eq!(lines[3], "22 |");
    }

    #[test]
    fn test_display_cell() {
        assert_eq!(display_cell(&CellValue::Null), "");
        assert_eq!(display_cell(&CellValue::Int(3)), "3");
    }
}
