use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{model::TableRole, period::Period};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile sales ledgers with settlement statements into commission payouts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compute the commission payable per salesperson for one closing period
    Reconcile(ReconcileArgs),
    /// List the closing periods present in a settlement table
    Periods(PeriodsArgs),
    /// Show which columns of a CSV file feed each logical field
    Columns(ColumnsArgs),
    /// Write the default field-resolution table as YAML
    Fields(FieldsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Ledger,
    Settlement,
}

impl From<RoleArg> for TableRole {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Ledger => TableRole::Ledger,
            RoleArg::Settlement => TableRole::Settlement,
        }
    }
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); sniffed when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML field-resolution table replacing the built-in aliases
    #[arg(long = "fields")]
    pub fields: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Sales ledger CSV (contract, commission percentage, installments, salesperson)
    #[arg(short = 'l', long = "ledger")]
    pub ledger: PathBuf,
    /// Settlement CSV (contract, settled value, closing date)
    #[arg(short = 's', long = "settlement")]
    pub settlement: PathBuf,
    /// Closing period as MM/YYYY (defaults to the most recent period in the data)
    #[arg(short = 'p', long = "period")]
    pub period: Option<Period>,
    /// Output file for the summary (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Summary output format
    #[arg(long = "format", value_enum, default_value = "csv")]
    pub format: OutputFormat,
    /// Also write the per-contract commission lines to this CSV file
    #[arg(long = "lines")]
    pub lines: Option<PathBuf>,
    /// Write the full diagnostics report to this JSON file
    #[arg(long = "diagnostics")]
    pub diagnostics: Option<PathBuf>,
    /// Delimiter for CSV output (defaults to ',')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct PeriodsArgs {
    /// Settlement CSV to scan for closing dates
    #[arg(short = 's', long = "settlement")]
    pub settlement: PathBuf,
    /// Sales ledger CSV supplying dates missing from the settlement rows
    #[arg(short = 'l', long = "ledger")]
    pub ledger: Option<PathBuf>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// CSV file whose header row is inspected
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Which table the file represents
    #[arg(long = "role", value_enum)]
    pub role: RoleArg,
    #[command(flatten)]
    pub options: InputArgs,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Destination YAML file (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
