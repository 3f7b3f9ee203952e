//! CSV reading and writing for the command line front end.
//!
//! The reconciliation core only sees [`RawTable`]s; this module is the one
//! place that touches files. It provides:
//!
//! - **Delimiter resolution**: an explicit `--delimiter` wins, `.tsv` means
//!   tab, otherwise the header line is sniffed for `,` `;` or tab
//!   (spreadsheet exports in comma-decimal locales use `;`).
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8;
//!   `windows-1252` covers most legacy spreadsheet exports.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::data::{Cell, RawTable};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
const SNIFF_CANDIDATES: &[u8] = &[b';', b',', b'\t'];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Picks the delimiter for an input given its path and the first bytes of its content.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>, content: &[u8]) -> u8 {
    if let Some(delimiter) = provided {
        return delimiter;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => sniff_delimiter(content).unwrap_or(DEFAULT_CSV_DELIMITER),
    }
}

/// Most frequent candidate outside quotes on the first line, ties going to `;`.
pub fn sniff_delimiter(content: &[u8]) -> Option<u8> {
    let mut counts = [0usize; 3];
    let mut in_quotes = false;
    for byte in content.iter().take_while(|b| **b != b'\n') {
        if *byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = SNIFF_CANDIDATES.iter().position(|c| c == byte) {
            counts[idx] += 1;
        }
    }
    let (idx, best) = counts
        .iter()
        .enumerate()
        .fold((0, 0), |acc, (idx, count)| if *count > acc.1 { (idx, *count) } else { acc });
    (best > 0).then(|| SNIFF_CANDIDATES[idx])
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading standard input")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a whole CSV input into a [`RawTable`] of text cells.
pub fn read_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    let bytes = read_input_bytes(path)?;
    let delimiter = resolve_input_delimiter(path, delimiter, &bytes);
    debug!(
        "Reading {path:?} with delimiter '{}' and encoding {}",
        crate::printable_delimiter(delimiter),
        encoding.name()
    );
    let mut reader = open_csv_reader(bytes.as_slice(), delimiter);
    let headers = decode_record(reader.byte_headers()?, encoding)
        .with_context(|| format!("Decoding headers of {path:?}"))?;
    let mut table = RawTable::new(headers);
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        table.push_row(decoded.into_iter().map(Cell::from));
    }
    Ok(table)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(base))
}
