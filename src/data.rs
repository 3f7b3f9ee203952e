use std::{fmt, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

const CURRENCY_MARKERS: &[&str] = &["R$", "US$", "$", "€", "BRL", "USD"];
const EXCEL_SERIAL_MAX: u64 = 2_958_465;

static EMPTY_CELL: Cell = Cell::Empty;

/// A raw spreadsheet cell as handed over by an input layer.
///
/// CSV readers only ever produce [`Cell::Text`] and [`Cell::Empty`]; callers that
/// parse native spreadsheets can pass typed numbers and dates straight through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
}

impl Cell {
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(d) => d.normalize().to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Identifier rendering used for contract ids and salesperson names.
    pub fn to_key(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        let rendered = self.as_display();
        Some(rendered.trim().to_string())
    }

    pub fn to_decimal(&self) -> Result<Option<Decimal>> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Text(s) => parse_decimal_text(s),
            Cell::Number(d) => Ok(Some(*d)),
            Cell::Date(d) => Err(anyhow!("Expected a number but found date {d}")),
        }
    }

    pub fn to_date(&self) -> Result<Option<NaiveDate>> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) => {
                let trimmed = s.trim();
                match parse_naive_date(trimmed) {
                    Ok(date) => Ok(Some(date)),
                    // CSV exports of date columns sometimes carry the raw serial
                    Err(err) => Decimal::from_str(trimmed)
                        .ok()
                        .and_then(excel_serial_date)
                        .map(Some)
                        .ok_or(err),
                }
            }
            Cell::Number(d) => excel_serial_date(*d)
                .map(Some)
                .ok_or_else(|| anyhow!("Number {d} is not a spreadsheet date serial")),
            Cell::Date(d) => Ok(Some(*d)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(Decimal::from(value))
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

/// Ordered header labels plus positional rows, exactly as read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, C>(&mut self, cells: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn with_row<I, C>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        self.push_row(cells);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells past the end of a short row read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt)
            && parsed.year() >= 1000
        {
            return Ok(parsed);
        }
    }
    parse_naive_datetime(value)
        .map(|dt| dt.date())
        .map_err(|_| anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Day number in the 1900 spreadsheet date system (day 1 is 1900-01-01,
/// counted from 1899-12-30 to absorb the phantom 1900-02-29).
pub fn excel_serial_date(serial: Decimal) -> Option<NaiveDate> {
    let days = serial.trunc().to_u64()?;
    if !(1..=EXCEL_SERIAL_MAX).contains(&days) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days))
}

/// Parses amounts and percentages written the way spreadsheet users write them:
/// `1.234,56`, `1,234.56`, `R$ 1.000,00`, `10%`, `(25,00)`.
pub fn parse_decimal_text(value: &str) -> Result<Option<Decimal>> {
    let compact = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    if compact.is_empty() {
        return Ok(None);
    }

    let mut negative = false;
    let mut text = compact.as_str();
    if let Some(inner) = text.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        negative = true;
        text = inner;
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest;
    }
    let mut currency = false;
    for marker in CURRENCY_MARKERS {
        if let Some(rest) = text.strip_prefix(marker) {
            currency = true;
            text = rest;
            break;
        }
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest;
    }
    text = text.strip_suffix('%').unwrap_or(text);
    if text.is_empty() || !text.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == ',')
    {
        bail!("Failed to parse '{value}' as number");
    }

    let canonical = canonical_number(text, currency);
    let parsed = Decimal::from_str(&canonical)
        .or_else(|_| Decimal::from_scientific(&canonical))
        .with_context(|| format!("Failed to parse '{value}' as number"))?;
    Ok(Some(if negative { -parsed } else { parsed }))
}

/// With a currency marker, a lone `.` followed by exactly three digits is
/// grouping (`R$ 2.500` is two thousand five hundred).
fn canonical_number(text: &str, currency: bool) -> String {
    match (text.rfind('.'), text.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (decimal, group) = if dot > comma { ('.', ',') } else { (',', '.') };
            text.chars()
                .filter(|c| *c != group)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        }
        (None, Some(_)) if text.matches(',').count() == 1 => text.replace(',', "."),
        (None, Some(_)) => text.replace(',', ""),
        (Some(_), None) if text.matches('.').count() > 1 => text.replace('.', ""),
        (Some(dot), None) if currency && is_thousands_group(text, dot) => text.replace('.', ""),
        _ => text.to_string(),
    }
}

fn is_thousands_group(text: &str, dot: usize) -> bool {
    let tail = &text[dot + 1..];
    dot > 0 && tail.len() == 3 && tail.bytes().all(|b| b.is_ascii_digit())
}
