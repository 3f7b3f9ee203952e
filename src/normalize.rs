//! Header canonicalization and typed record extraction.
//!
//! [`NormalizedTable`] trims and upper-cases the labels of a [`RawTable`].
//! Once the resolver has mapped logical fields to columns,
//! [`extract_sales`] and [`extract_settlements`] coerce the designated
//! cells into typed records. A cell that cannot be parsed becomes `None`,
//! is listed in the record's `unparsed` fields and leaves a
//! [`ParseWarning`](crate::diagnostics::ParseWarning) behind; it is never
//! replaced by zero or by the other table's value.

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use rust_decimal::Decimal;

use crate::{
    data::{Cell, RawTable},
    diagnostics::{Diagnostics, ValueKind},
    fields::{ColumnMap, LogicalField},
    model::{SaleRecord, SettlementRecord, TableRole},
};

/// Trim (including a leading byte-order mark), collapse inner whitespace, uppercase.
pub fn normalize_label(label: &str) -> String {
    label
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .join(" ")
        .to_uppercase()
}

#[derive(Debug, Clone)]
pub struct NormalizedTable<'a> {
    pub role: TableRole,
    pub labels: Vec<String>,
    raw: &'a RawTable,
}

impl<'a> NormalizedTable<'a> {
    pub fn new(role: TableRole, raw: &'a RawTable) -> Self {
        Self {
            role,
            labels: raw.headers.iter().map(|h| normalize_label(h)).collect(),
            raw,
        }
    }

    pub fn row_count(&self) -> usize {
        self.raw.len()
    }

    /// Export artifacts such as `;;;;` lines carry no data at all.
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.raw
            .rows
            .get(row)
            .is_none_or(|cells| cells.iter().all(Cell::is_blank))
    }

    fn cell(&self, row: usize, column: Option<usize>) -> Option<&Cell> {
        column.map(|idx| self.raw.cell(row, idx))
    }
}

/// Spreadsheet row number for a zero-based data row (the header occupies row 1).
pub fn sheet_row(index: usize) -> usize {
    index + 2
}

struct CellReader<'t, 'a> {
    table: &'t NormalizedTable<'a>,
    map: &'t ColumnMap,
}

/// Per-row sink for parse failures.
struct RowIssues<'d> {
    diagnostics: &'d mut Diagnostics,
    unparsed: Vec<LogicalField>,
}

impl CellReader<'_, '_> {
    fn column_label(&self, field: LogicalField) -> &str {
        self.map
            .get(field)
            .map(|c| c.label.as_str())
            .unwrap_or_default()
    }

    fn key(&self, row: usize, field: LogicalField) -> Option<String> {
        self.table
            .cell(row, self.map.index(field))
            .and_then(Cell::to_key)
    }

    fn decimal(&self, row: usize, field: LogicalField, issues: &mut RowIssues<'_>) -> Option<Decimal> {
        let cell = self.table.cell(row, self.map.index(field))?;
        match cell.to_decimal() {
            Ok(value) => value,
            Err(err) => {
                debug!(
                    "{} row {}: {err:#}",
                    self.table.role,
                    sheet_row(row)
                );
                issues.unparsed.push(field);
                issues.diagnostics.record_parse_warning(
                    self.table.role,
                    sheet_row(row),
                    self.column_label(field),
                    cell.as_display(),
                    ValueKind::Number,
                );
                None
            }
        }
    }

    fn date(&self, row: usize, field: LogicalField, issues: &mut RowIssues<'_>) -> Option<NaiveDate> {
        let cell = self.table.cell(row, self.map.index(field))?;
        match cell.to_date() {
            Ok(value) => value,
            Err(err) => {
                debug!(
                    "{} row {}: {err:#}",
                    self.table.role,
                    sheet_row(row)
                );
                issues.unparsed.push(field);
                issues.diagnostics.record_parse_warning(
                    self.table.role,
                    sheet_row(row),
                    self.column_label(field),
                    cell.as_display(),
                    ValueKind::Date,
                );
                None
            }
        }
    }
}

/// Builds ledger records. Rows without a contract id can never be matched and
/// are dropped here with a parse warning.
pub fn extract_sales(
    table: &NormalizedTable<'_>,
    map: &ColumnMap,
    diagnostics: &mut Diagnostics,
) -> Vec<SaleRecord> {
    let reader = CellReader { table, map };
    let mut records = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        if table.is_blank_row(row) {
            continue;
        }
        let Some(contract) = reader.key(row, LogicalField::ContractId) else {
            diagnostics.record_parse_warning(
                table.role,
                sheet_row(row),
                reader.column_label(LogicalField::ContractId),
                String::new(),
                ValueKind::Identifier,
            );
            continue;
        };
        let mut issues = RowIssues {
            diagnostics: &mut *diagnostics,
            unparsed: Vec::new(),
        };
        records.push(SaleRecord {
            row: sheet_row(row),
            contract,
            percentage: reader.decimal(row, LogicalField::CommissionPercent, &mut issues),
            sale_value: reader.decimal(row, LogicalField::BaseValue, &mut issues),
            installments: reader.decimal(row, LogicalField::InstallmentCount, &mut issues),
            salesperson: reader.key(row, LogicalField::Salesperson),
            closing_date: reader.date(row, LogicalField::ClosingDate, &mut issues),
            unparsed: issues.unparsed,
        });
    }
    debug!(
        "Extracted {} ledger record(s) from {} row(s)",
        records.len(),
        table.row_count()
    );
    records
}

pub fn extract_settlements(
    table: &NormalizedTable<'_>,
    map: &ColumnMap,
    diagnostics: &mut Diagnostics,
) -> Vec<SettlementRecord> {
    let reader = CellReader { table, map };
    let mut records = Vec::with_capacity(table.row_count());
    for row in (0..table.row_count()).filter(|row| !table.is_blank_row(*row)) {
        let mut issues = RowIssues {
            diagnostics: &mut *diagnostics,
            unparsed: Vec::new(),
        };
        records.push(SettlementRecord {
            row: sheet_row(row),
            contract: reader
                .key(row, LogicalField::ContractId)
                .unwrap_or_default(),
            base_value: reader.decimal(row, LogicalField::BaseValue, &mut issues),
            closing_date: reader.date(row, LogicalField::ClosingDate, &mut issues),
            percentage: reader.decimal(row, LogicalField::CommissionPercent, &mut issues),
            installments: reader.decimal(row, LogicalField::InstallmentCount, &mut issues),
            salesperson: reader.key(row, LogicalField::Salesperson),
            unparsed: issues.unparsed,
        });
    }
    records
}
