//! Non-fatal data-quality findings accumulated during a reconciliation run.
//!
//! Every row that is dropped between the input tables and the payout summary
//! leaves a trace here: a counter bumped under its reason plus a
//! [`SkippedRow`] entry naming the spreadsheet row. Cells that could not be
//! parsed are kept as [`ParseWarning`]s. Nothing in this module aborts a run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TableRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingClosingDate,
    UnparseableClosingDate,
    UnmatchedContract,
    InvalidInstallmentCount,
    UnparseableInstallmentCount,
    MissingBaseValue,
    UnparseableBaseValue,
    MissingPercentage,
    UnparseablePercentage,
    MissingSalesperson,
    ArithmeticOverflow,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::MissingClosingDate => "missing closing date",
            SkipReason::UnparseableClosingDate => "unparseable closing date",
            SkipReason::UnmatchedContract => "unmatched contract",
            SkipReason::InvalidInstallmentCount => "invalid installment count",
            SkipReason::UnparseableInstallmentCount => "unparseable installment count",
            SkipReason::MissingBaseValue => "missing base value",
            SkipReason::UnparseableBaseValue => "unparseable base value",
            SkipReason::MissingPercentage => "missing commission percentage",
            SkipReason::UnparseablePercentage => "unparseable commission percentage",
            SkipReason::MissingSalesperson => "missing salesperson",
            SkipReason::ArithmeticOverflow => "arithmetic overflow",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Number,
    Date,
    Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub table: TableRole,
    pub row: usize,
    pub column: String,
    pub value: String,
    pub expected: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: usize,
    pub contract: String,
    pub reason: SkipReason,
}

/// A ledger row whose contract id was already taken by an earlier row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateContract {
    pub contract: String,
    pub row: usize,
    pub first_row: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub skipped_missing_date: usize,
    pub skipped_unmatched_contract: usize,
    pub skipped_invalid_installments: usize,
    pub skipped_missing_operand: usize,
    pub duplicate_contract_ids: usize,
    pub out_of_period: usize,
    pub lines_computed: usize,
    pub parse_warnings: Vec<ParseWarning>,
    pub skipped: Vec<SkippedRow>,
    pub duplicates: Vec<DuplicateContract>,
}

impl Diagnostics {
    pub fn record_skip(&mut self, row: usize, contract: &str, reason: SkipReason) {
        let counter = match reason {
            SkipReason::MissingClosingDate | SkipReason::UnparseableClosingDate => {
                &mut self.skipped_missing_date
            }
            SkipReason::UnmatchedContract => &mut self.skipped_unmatched_contract,
            SkipReason::InvalidInstallmentCount | SkipReason::UnparseableInstallmentCount => {
                &mut self.skipped_invalid_installments
            }
            SkipReason::MissingBaseValue
            | SkipReason::UnparseableBaseValue
            | SkipReason::MissingPercentage
            | SkipReason::UnparseablePercentage
            | SkipReason::MissingSalesperson
            | SkipReason::ArithmeticOverflow => &mut self.skipped_missing_operand,
        };
        *counter += 1;
        self.skipped.push(SkippedRow {
            row,
            contract: contract.to_string(),
            reason,
        });
    }

    pub fn record_parse_warning(
        &mut self,
        table: TableRole,
        row: usize,
        column: &str,
        value: String,
        expected: ValueKind,
    ) {
        self.parse_warnings.push(ParseWarning {
            table,
            row,
            column: column.to_string(),
            value,
            expected,
        });
    }

    pub fn record_duplicate(&mut self, contract: &str, row: usize, first_row: usize) {
        self.duplicate_contract_ids += 1;
        self.duplicates.push(DuplicateContract {
            contract: contract.to_string(),
            row,
            first_row,
        });
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.len()
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.parse_warnings.is_empty() && self.duplicates.is_empty()
    }

    /// Label/count pairs in a fixed order for reports.
    pub fn counters(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("lines computed", self.lines_computed),
            ("skipped: missing closing date", self.skipped_missing_date),
            ("skipped: unmatched contract", self.skipped_unmatched_contract),
            (
                "skipped: invalid installment count",
                self.skipped_invalid_installments,
            ),
            ("skipped: missing operand", self.skipped_missing_operand),
            ("duplicate ledger contract ids", self.duplicate_contract_ids),
            ("outside selected period", self.out_of_period),
            ("unparseable cells", self.parse_warnings.len()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_skip_routes_reasons_to_counters() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record_skip(2, "1", SkipReason::MissingClosingDate);
        diagnostics.record_skip(3, "2", SkipReason::UnmatchedContract);
        diagnostics.record_skip(4, "3", SkipReason::InvalidInstallmentCount);
        diagnostics.record_skip(5, "4", SkipReason::MissingPercentage);
        diagnostics.record_skip(6, "5", SkipReason::MissingSalesperson);
        diagnostics.record_skip(7, "6", SkipReason::UnparseableClosingDate);
        diagnostics.record_skip(8, "7", SkipReason::UnparseableBaseValue);
        diagnostics.record_skip(9, "8", SkipReason::UnparseableInstallmentCount);

        assert_eq!(diagnostics.skipped_missing_date, 2);
        assert_eq!(diagnostics.skipped_unmatched_contract, 1);
        assert_eq!(diagnostics.skipped_invalid_installments, 2);
        assert_eq!(diagnostics.skipped_missing_operand, 3);
        assert_eq!(diagnostics.skipped_total(), 8);
        assert_eq!(diagnostics.count(SkipReason::MissingSalesperson), 1);
        assert!(!diagnostics.is_clean());
    }

    #[test]
    fn default_diagnostics_are_clean() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.is_clean());
        assert!(diagnostics.counters().iter().all(|(_, count)| *count == 0));
    }

    #[test]
    fn skip_reasons_serialize_as_snake_case() {
        let json = serde_json::to_string(&SkipReason::InvalidInstallmentCount).unwrap();
        assert_eq!(json, "\"invalid_installment_count\"");
    }
}
