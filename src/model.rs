use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{diagnostics::SkipReason, fields::LogicalField};

/// Which of the two input tables a column, row, or warning belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    Ledger,
    Settlement,
}

impl TableRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableRole::Ledger => "sales ledger",
            TableRole::Settlement => "settlement table",
        }
    }
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the sales ledger. `row` is the 1-based spreadsheet row (header is row 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub row: usize,
    pub contract: String,
    pub percentage: Option<Decimal>,
    pub sale_value: Option<Decimal>,
    pub installments: Option<Decimal>,
    pub salesperson: Option<String>,
    pub closing_date: Option<NaiveDate>,
    /// Fields whose cell held something that could not be parsed (as opposed to blank).
    pub unparsed: Vec<LogicalField>,
}

impl SaleRecord {
    pub fn is_unparsed(&self, field: LogicalField) -> bool {
        self.unparsed.contains(&field)
    }
}

/// One row of the settlement statement.
///
/// The contract id may be blank; such rows survive extraction so they can be
/// reported as unmatched instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRecord {
    pub row: usize,
    pub contract: String,
    pub base_value: Option<Decimal>,
    pub closing_date: Option<NaiveDate>,
    pub percentage: Option<Decimal>,
    pub installments: Option<Decimal>,
    pub salesperson: Option<String>,
    pub unparsed: Vec<LogicalField>,
}

impl SettlementRecord {
    pub fn is_unparsed(&self, field: LogicalField) -> bool {
        self.unparsed.contains(&field)
    }
}

/// A settlement row joined with the ledger fields it lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub row: usize,
    pub contract: String,
    pub closing_date: NaiveDate,
    pub base_value: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub installments: Option<Decimal>,
    pub salesperson: Option<String>,
}

impl MatchedRecord {
    /// Settlement values win; the ledger fills only what the settlement row left
    /// blank. An unparseable cell on the side that would supply a value fails
    /// the join with the matching skip reason.
    pub fn join(
        settlement: &SettlementRecord,
        sale: &SaleRecord,
        closing_date: NaiveDate,
    ) -> Result<Self, SkipReason> {
        let pick = |field: LogicalField,
                    own: Option<Decimal>,
                    fallback: Option<Decimal>,
                    reason: SkipReason| {
            match own {
                Some(value) => Ok(Some(value)),
                None if settlement.is_unparsed(field) => Err(reason),
                None if sale.is_unparsed(field) => Err(reason),
                None => Ok(fallback),
            }
        };
        let installments = pick(
            LogicalField::InstallmentCount,
            settlement.installments,
            sale.installments,
            SkipReason::UnparseableInstallmentCount,
        )?;
        let base_value = pick(
            LogicalField::BaseValue,
            settlement.base_value,
            sale.sale_value,
            SkipReason::UnparseableBaseValue,
        )?;
        let percentage = pick(
            LogicalField::CommissionPercent,
            settlement.percentage,
            sale.percentage,
            SkipReason::UnparseablePercentage,
        )?;
        Ok(Self {
            row: settlement.row,
            contract: settlement.contract.clone(),
            closing_date,
            base_value,
            percentage,
            installments,
            salesperson: settlement
                .salesperson
                .clone()
                .or_else(|| sale.salesperson.clone()),
        })
    }
}

/// Commission owed on one paid settlement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionLine {
    pub salesperson: String,
    pub contract: String,
    pub row: usize,
    pub closing_date: NaiveDate,
    pub base_value: Decimal,
    pub percentage: Decimal,
    pub installments: u32,
    pub total: Decimal,
    pub per_installment: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale() -> SaleRecord {
        SaleRecord {
            row: 2,
            contract: "100".into(),
            percentage: Some(Decimal::TEN),
            sale_value: Some(Decimal::from(9_999)),
            installments: Some(Decimal::TWO),
            salesperson: Some("Ana".into()),
            closing_date: None,
            unparsed: Vec::new(),
        }
    }

    fn settlement(row: usize, date: NaiveDate) -> SettlementRecord {
        SettlementRecord {
            row,
            contract: "100".into(),
            base_value: None,
            closing_date: Some(date),
            percentage: None,
            installments: None,
            salesperson: None,
            unparsed: Vec::new(),
        }
    }

    #[test]
    fn join_prefers_settlement_values() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let settlement = SettlementRecord {
            base_value: Some(Decimal::from(1_000)),
            installments: Some(Decimal::ONE),
            ..settlement(7, date)
        };
        let matched = MatchedRecord::join(&settlement, &sale(), date).unwrap();
        assert_eq!(matched.row, 7);
        assert_eq!(matched.base_value, Some(Decimal::from(1_000)));
        assert_eq!(matched.percentage, Some(Decimal::TEN));
        assert_eq!(matched.installments, Some(Decimal::ONE));
        assert_eq!(matched.salesperson.as_deref(), Some("Ana"));
    }

    #[test]
    fn join_keeps_fields_missing_on_both_sides_missing() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut ledger = sale();
        ledger.percentage = None;
        let matched = MatchedRecord::join(&settlement(3, date), &ledger, date).unwrap();
        assert_eq!(matched.percentage, None);
        assert_eq!(matched.base_value, Some(Decimal::from(9_999)));
    }

    #[test]
    fn unparseable_settlement_cell_is_not_filled_from_ledger() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let settlement = SettlementRecord {
            unparsed: vec![LogicalField::BaseValue],
            ..settlement(4, date)
        };
        assert_eq!(
            MatchedRecord::join(&settlement, &sale(), date),
            Err(SkipReason::UnparseableBaseValue)
        );
    }

    #[test]
    fn unparseable_ledger_cell_fails_only_when_needed() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut ledger = sale();
        ledger.percentage = None;
        ledger.unparsed = vec![LogicalField::CommissionPercent];

        assert_eq!(
            MatchedRecord::join(&settlement(5, date), &ledger, date),
            Err(SkipReason::UnparseablePercentage)
        );

        let covered = SettlementRecord {
            percentage: Some(Decimal::ONE),
            ..settlement(6, date)
        };
        let matched = MatchedRecord::join(&covered, &ledger, date).unwrap();
        assert_eq!(matched.percentage, Some(Decimal::ONE));
    }
}
