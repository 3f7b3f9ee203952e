pub mod aggregate;
pub mod cli;
pub mod commission;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod fields;
pub mod io_utils;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod period;
pub mod reconcile;
pub mod report;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use encoding_rs::Encoding;
use log::{LevelFilter, debug, info, warn};

pub use crate::{
    aggregate::{PayoutRow, PayoutSummary},
    data::{Cell, RawTable},
    diagnostics::Diagnostics,
    error::SchemaError,
    fields::FieldTable,
    model::CommissionLine,
    period::Period,
    reconcile::{Reconciliation, Reconciler, reconcile},
};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    fields::LogicalField,
    model::TableRole,
    normalize::NormalizedTable,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("commission_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Reconcile(args) => handle_reconcile(&args),
        Commands::Periods(args) => handle_periods(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Fields(args) => handle_fields(&args),
    }
}

fn load_fields(path: Option<&Path>) -> Result<FieldTable> {
    match path {
        Some(path) => {
            FieldTable::load(path).with_context(|| format!("Loading field table from {path:?}"))
        }
        None => Ok(FieldTable::default()),
    }
}

fn read_input(path: &Path, options: &InputArgs, encoding: &'static Encoding) -> Result<RawTable> {
    let table = io_utils::read_table(path, options.delimiter, encoding)
        .with_context(|| format!("Reading {path:?}"))?;
    debug!("{path:?}: {} column(s), {} row(s)", table.headers.len(), table.len());
    Ok(table)
}

fn handle_reconcile(args: &cli::ReconcileArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let reconciler = Reconciler::new(load_fields(args.input.fields.as_deref())?);
    info!(
        "Reconciling ledger {:?} against settlement {:?}",
        args.ledger, args.settlement
    );
    let ledger = read_input(&args.ledger, &args.input, encoding)?;
    let settlement = read_input(&args.settlement, &args.input, encoding)?;
    let prepared = reconciler.prepare(&ledger, &settlement)?;
    let unreadable = prepared.parse_diagnostics().parse_warnings.len();
    if unreadable > 0 {
        warn!("{unreadable} cell(s) could not be parsed; rows that need them are skipped");
    }

    let available = prepared.periods();
    let period = match args.period {
        Some(period) => {
            if !available.contains(&period) {
                warn!(
                    "Period {period} has no settlement rows; available periods: {}",
                    format_periods(&available)
                );
            }
            period
        }
        None => {
            let latest = available
                .last()
                .copied()
                .context("No settlement row carries a closing date; pass --period explicitly")?;
            info!("No --period given; using most recent period {latest}");
            latest
        }
    };

    let result = prepared.run(period);
    let delimiter = args.output_delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    match args.format {
        OutputFormat::Csv => {
            report::write_summary_csv(&result.summary, args.output.as_deref(), delimiter)?
        }
        OutputFormat::Json => report::write_reconciliation_json(&result, args.output.as_deref())?,
        OutputFormat::Table => print!("{}", report::render_summary(&result.summary)),
    }
    if let Some(path) = &args.lines {
        report::write_lines_csv(&result.lines, path, delimiter)
            .with_context(|| format!("Writing commission lines to {path:?}"))?;
        info!("{} commission line(s) written to {path:?}", result.lines.len());
    }
    if let Some(path) = &args.diagnostics {
        report::write_json(&result.diagnostics, Some(path))
            .with_context(|| format!("Writing diagnostics to {path:?}"))?;
        info!("Diagnostics written to {path:?}");
    }
    if !result.diagnostics.is_clean() {
        info!(
            "Row checks for {period}:\n{}",
            report::render_diagnostics(&result.diagnostics)
        );
    }
    info!(
        "{} salesperson(s) payable for {period}, total {}",
        result.summary.len(),
        result.summary.total()
    );
    Ok(())
}

fn handle_periods(args: &cli::PeriodsArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let reconciler = Reconciler::new(load_fields(args.input.fields.as_deref())?);
    let settlement = read_input(&args.settlement, &args.input, encoding)?;

    let periods = match &args.ledger {
        Some(path) => {
            let ledger = read_input(path, &args.input, encoding)?;
            reconciler.periods(&ledger, &settlement)?
        }
        None => {
            let settlement_labels = NormalizedTable::new(TableRole::Settlement, &settlement);
            let settlement_map = reconciler
                .fields()
                .resolve(TableRole::Settlement, &settlement_labels.labels);
            if !settlement_map.contains(LogicalField::ClosingDate) {
                return Err(SchemaError::MissingColumn {
                    field: LogicalField::ClosingDate,
                    table: TableRole::Settlement,
                }
                .into());
            }
            let mut diagnostics = Diagnostics::default();
            let records =
                normalize::extract_settlements(&settlement_labels, &settlement_map, &mut diagnostics);
            period::available_periods(&records, None)
        }
    };
    if periods.is_empty() {
        warn!("No closing dates found in {:?}", args.settlement);
    }
    for period in periods {
        println!("{period}");
    }
    Ok(())
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.options.input_encoding.as_deref())?;
    let fields = load_fields(args.options.fields.as_deref())?;
    let role = TableRole::from(args.role);
    let table = read_input(&args.input, &args.options, encoding)?;
    let normalized = NormalizedTable::new(role, &table);
    let map = fields.resolve(role, &normalized.labels);

    let headers = ["field", "column", "label", "match"]
        .map(String::from)
        .to_vec();
    let rows = LogicalField::ALL
        .iter()
        .map(|field| match map.get(*field) {
            Some(column) => vec![
                field.to_string(),
                (column.index + 1).to_string(),
                table.headers[column.index].clone(),
                column.kind.to_string(),
            ],
            None => vec![
                field.to_string(),
                "-".to_string(),
                String::new(),
                "missing".to_string(),
            ],
        })
        .collect::<Vec<_>>();
    println!("{} columns of {:?}", role, args.input);
    table::print_table(&headers, &rows, &[]);
    Ok(())
}

fn handle_fields(args: &cli::FieldsArgs) -> Result<()> {
    let fields = FieldTable::default();
    match args.output.as_deref() {
        Some(path) if !io_utils::is_dash(path) => {
            fields
                .save(path)
                .with_context(|| format!("Writing field table to {path:?}"))?;
            info!("Default field table written to {path:?}");
        }
        _ => print!("{}", fields.to_yaml_string()?),
    }
    Ok(())
}

fn format_periods(periods: &[Period]) -> String {
    if periods.is_empty() {
        return "none".to_string();
    }
    periods
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
