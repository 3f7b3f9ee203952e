//! The reconciliation pipeline as one pure call.
//!
//! ```text
//! ledger, settlement ──normalize──▶ labels ──resolve──▶ column maps ──validate──▶
//!   typed records ──period filter──▶ in-period rows ──match──▶ joined rows
//!   ──compute──▶ commission lines ──aggregate──▶ payout summary
//! ```
//!
//! Schema problems stop the run before any record is touched. Everything
//! after that is row-level: problems land in [`Diagnostics`] and the caller
//! always gets a (possibly empty) [`PayoutSummary`]. No state survives
//! between calls, so the same inputs always give the same result.

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    aggregate::{PayoutSummary, aggregate},
    commission::compute_lines,
    data::RawTable,
    diagnostics::Diagnostics,
    error::SchemaError,
    fields::{self, ColumnMap, FieldTable},
    matcher::{LedgerIndex, match_settlements},
    model::{CommissionLine, SaleRecord, SettlementRecord, TableRole},
    normalize::{NormalizedTable, extract_sales, extract_settlements},
    period::{Period, available_periods, filter_period},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub period: Period,
    pub summary: PayoutSummary,
    pub lines: Vec<CommissionLine>,
    pub diagnostics: Diagnostics,
}

/// Reconciles with the built-in field table.
pub fn reconcile(
    ledger: &RawTable,
    settlement: &RawTable,
    period: Period,
) -> Result<Reconciliation, SchemaError> {
    Reconciler::default().run(ledger, settlement, period)
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    fields: FieldTable,
}

impl Reconciler {
    pub fn new(fields: FieldTable) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Resolves and validates both schemas, then extracts typed records.
    pub fn prepare(
        &self,
        ledger: &RawTable,
        settlement: &RawTable,
    ) -> Result<Prepared, SchemaError> {
        let ledger_table = NormalizedTable::new(TableRole::Ledger, ledger);
        let settlement_table = NormalizedTable::new(TableRole::Settlement, settlement);
        for table in [&ledger_table, &settlement_table] {
            if table.labels.iter().all(|label| label.is_empty()) {
                return Err(SchemaError::NoHeaders { table: table.role });
            }
        }

        let ledger_map = self.fields.resolve(TableRole::Ledger, &ledger_table.labels);
        let settlement_map = self
            .fields
            .resolve(TableRole::Settlement, &settlement_table.labels);
        fields::validate(&ledger_map, &settlement_map)?;
        log_resolution(&ledger_map);
        log_resolution(&settlement_map);

        let mut diagnostics = Diagnostics::default();
        let sales = extract_sales(&ledger_table, &ledger_map, &mut diagnostics);
        let settlements = extract_settlements(&settlement_table, &settlement_map, &mut diagnostics);
        Ok(Prepared {
            sales,
            settlements,
            diagnostics,
        })
    }

    pub fn run(
        &self,
        ledger: &RawTable,
        settlement: &RawTable,
        period: Period,
    ) -> Result<Reconciliation, SchemaError> {
        Ok(self.prepare(ledger, settlement)?.run(period))
    }

    /// Periods present in the settlement data, using ledger dates where the
    /// settlement row has none.
    pub fn periods(
        &self,
        ledger: &RawTable,
        settlement: &RawTable,
    ) -> Result<Vec<Period>, SchemaError> {
        Ok(self.prepare(ledger, settlement)?.periods())
    }
}

fn log_resolution(map: &ColumnMap) {
    for column in map.iter() {
        debug!(
            "{}: {} -> '{}' (column {}, {})",
            map.role,
            column.field,
            column.label,
            column.index + 1,
            column.kind
        );
    }
}

/// Typed records of both tables, ready to be reconciled for any period.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub sales: Vec<SaleRecord>,
    pub settlements: Vec<SettlementRecord>,
    diagnostics: Diagnostics,
}

impl Prepared {
    /// Parse warnings collected while extracting records.
    pub fn parse_diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn periods(&self) -> Vec<Period> {
        let mut scratch = Diagnostics::default();
        let index = LedgerIndex::build(&self.sales, &mut scratch);
        available_periods(&self.settlements, Some(&index))
    }

    pub fn run(&self, period: Period) -> Reconciliation {
        let mut diagnostics = self.diagnostics.clone();
        let index = LedgerIndex::build(&self.sales, &mut diagnostics);
        if diagnostics.duplicate_contract_ids > 0 {
            warn!(
                "{} repeated ledger contract id(s) ignored; the first occurrence of each is used",
                diagnostics.duplicate_contract_ids
            );
        }
        let in_period = filter_period(&self.settlements, &index, period, &mut diagnostics);
        if in_period.is_empty() && !self.settlements.is_empty() {
            warn!("No settlement row falls in period {period}");
        }
        let matched = match_settlements(&in_period, &index, &mut diagnostics);
        let lines = compute_lines(&matched, &mut diagnostics);
        let summary = aggregate(period, &lines);
        info!(
            "Period {period}: {} line(s) for {} salesperson(s), {} row(s) skipped",
            lines.len(),
            summary.len(),
            diagnostics.skipped_total()
        );
        Reconciliation {
            period,
            summary,
            lines,
            diagnostics,
        }
    }
}
