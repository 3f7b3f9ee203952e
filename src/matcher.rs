use std::collections::HashMap;

use log::debug;

use crate::{
    diagnostics::{Diagnostics, SkipReason},
    model::{MatchedRecord, SaleRecord},
    period::InPeriod,
};

/// Contract id to ledger record, first occurrence in ledger order wins.
#[derive(Debug, Default)]
pub struct LedgerIndex<'a> {
    by_contract: HashMap<&'a str, &'a SaleRecord>,
}

impl<'a> LedgerIndex<'a> {
    pub fn build(sales: &'a [SaleRecord], diagnostics: &mut Diagnostics) -> Self {
        let mut by_contract: HashMap<&'a str, &'a SaleRecord> = HashMap::with_capacity(sales.len());
        for sale in sales {
            match by_contract.get(sale.contract.as_str()) {
                Some(first) => {
                    debug!(
                        "Ledger contract '{}' on row {} repeats row {}; keeping the first",
                        sale.contract, sale.row, first.row
                    );
                    diagnostics.record_duplicate(&sale.contract, sale.row, first.row);
                }
                None => {
                    by_contract.insert(sale.contract.as_str(), sale);
                }
            }
        }
        Self { by_contract }
    }

    pub fn get(&self, contract: &str) -> Option<&'a SaleRecord> {
        self.by_contract.get(contract.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_contract.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_contract.is_empty()
    }
}

/// Left join of in-period settlement rows onto the ledger. Rows whose contract
/// the ledger does not know are counted and dropped.
pub fn match_settlements(
    in_period: &[InPeriod<'_>],
    ledger: &LedgerIndex<'_>,
    diagnostics: &mut Diagnostics,
) -> Vec<MatchedRecord> {
    let mut matched = Vec::with_capacity(in_period.len());
    for entry in in_period {
        let settlement = entry.record;
        match ledger.get(&settlement.contract) {
            Some(sale) => match MatchedRecord::join(settlement, sale, entry.closing_date) {
                Ok(record) => matched.push(record),
                Err(reason) => {
                    debug!(
                        "Settlement row {} (contract '{}') excluded: {reason}",
                        settlement.row, settlement.contract
                    );
                    diagnostics.record_skip(settlement.row, &settlement.contract, reason);
                }
            },
            None => {
                debug!(
                    "Settlement row {}: contract '{}' not in ledger",
                    settlement.row, settlement.contract
                );
                diagnostics.record_skip(
                    settlement.row,
                    &settlement.contract,
                    SkipReason::UnmatchedContract,
                );
            }
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SettlementRecord;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn sale(row: usize, contract: &str, salesperson: &str) -> SaleRecord {
        SaleRecord {
            row,
            contract: contract.into(),
            percentage: Some(Decimal::TEN),
            sale_value: None,
            installments: Some(Decimal::ONE),
            salesperson: Some(salesperson.into()),
            closing_date: None,
            unparsed: Vec::new(),
        }
    }

    fn settlement(row: usize, contract: &str) -> SettlementRecord {
        SettlementRecord {
            row,
            contract: contract.into(),
            base_value: Some(Decimal::ONE_HUNDRED),
            closing_date: NaiveDate::from_ymd_opt(2025, 1, 10),
            percentage: None,
            installments: None,
            salesperson: None,
            unparsed: Vec::new(),
        }
    }

    #[test]
    fn duplicate_contracts_keep_first_and_are_counted() {
        let sales = vec![
            sale(2, "400", "Bea"),
            sale(3, "400", "Caio"),
            sale(4, "401", "Dora"),
            sale(5, "400", "Eva"),
        ];
        let mut diagnostics = Diagnostics::default();
        let index = LedgerIndex::build(&sales, &mut diagnostics);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("400").unwrap().salesperson.as_deref(), Some("Bea"));
        assert_eq!(diagnostics.duplicate_contract_ids, 2);
        assert_eq!(diagnostics.duplicates[1].row, 5);
        assert_eq!(diagnostics.duplicates[1].first_row, 2);
    }

    #[test]
    fn unmatched_settlements_are_skipped_not_zeroed() {
        let sales = vec![sale(2, "100", "Ana")];
        let mut diagnostics = Diagnostics::default();
        let index = LedgerIndex::build(&sales, &mut diagnostics);
        let rows = vec![settlement(2, "100"), settlement(3, "200"), settlement(4, "")];
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let in_period = rows
            .iter()
            .map(|record| InPeriod {
                record,
                closing_date: date,
            })
            .collect::<Vec<_>>();

        let matched = match_settlements(&in_period, &index, &mut diagnostics);

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].contract, "100");
        assert_eq!(matched[0].salesperson.as_deref(), Some("Ana"));
        assert_eq!(diagnostics.skipped_unmatched_contract, 2);
    }

    #[test]
    fn lookup_is_exact_after_trimming() {
        let sales = vec![sale(2, "A-17", "Ana")];
        let mut diagnostics = Diagnostics::default();
        let index = LedgerIndex::build(&sales, &mut diagnostics);
        assert!(index.get(" A-17 ").is_some());
        assert!(index.get("a-17").is_none());
        assert!(index.get("A-170").is_none());
    }

    #[test]
    fn unreadable_settlement_value_skips_the_row() {
        let sales = vec![sale(2, "100", "Ana")];
        let mut diagnostics = Diagnostics::default();
        let index = LedgerIndex::build(&sales, &mut diagnostics);
        let mut row = settlement(2, "100");
        row.base_value = None;
        row.unparsed = vec![crate::fields::LogicalField::BaseValue];
        let in_period = [InPeriod {
            record: &row,
            closing_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        }];

        let matched = match_settlements(&in_period, &index, &mut diagnostics);

        assert!(matched.is_empty());
        assert_eq!(diagnostics.skipped_missing_operand, 1);
        assert_eq!(diagnostics.count(SkipReason::UnparseableBaseValue), 1);
    }
}
