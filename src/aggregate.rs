use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{model::CommissionLine, period::Period};

pub const CURRENCY_SCALE: u32 = 2;

/// Half-up (midpoint away from zero) to cents, always carried at scale 2.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRow {
    pub salesperson: String,
    pub commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub period: Period,
    pub rows: Vec<PayoutRow>,
}

impl PayoutSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, salesperson: &str) -> Option<Decimal> {
        self.rows
            .iter()
            .find(|row| row.salesperson == salesperson)
            .map(|row| row.commission)
    }

    /// Sum of the already rounded rows.
    pub fn total(&self) -> Decimal {
        let sum = self.rows.iter().map(|row| row.commission).sum::<Decimal>();
        round_currency(sum)
    }
}

/// Groups lines by salesperson, sums the unrounded per-installment values and
/// rounds each group once. Salespeople without a surviving line do not appear.
pub fn aggregate(period: Period, lines: &[CommissionLine]) -> PayoutSummary {
    let mut groups: BTreeMap<&str, Decimal> = BTreeMap::new();
    for line in lines {
        *groups.entry(line.salesperson.as_str()).or_insert(Decimal::ZERO) += line.per_installment;
    }

    PayoutSummary {
        period,
        rows: groups
            .into_iter()
            .map(|(salesperson, sum)| PayoutRow {
                salesperson: salesperson.to_string(),
                commission: round_currency(sum),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn line(salesperson: &str, per_installment: Decimal) -> CommissionLine {
        CommissionLine {
            salesperson: salesperson.into(),
            contract: "1".into(),
            row: 2,
            closing_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            base_value: Decimal::ZERO,
            percentage: Decimal::ZERO,
            installments: 1,
            total: per_installment,
            per_installment,
        }
    }

    fn period() -> Period {
        "01/2025".parse().unwrap()
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_currency(dec("0.125")).to_string(), "0.13");
        assert_eq!(round_currency(dec("0.135")).to_string(), "0.14");
        assert_eq!(round_currency(dec("-0.125")).to_string(), "-0.13");
        assert_eq!(round_currency(dec("0.124999")).to_string(), "0.12");
        assert_eq!(round_currency(dec("50")).to_string(), "50.00");
    }

    #[test]
    fn groups_by_exact_salesperson_and_orders_by_name() {
        let lines = vec![
            line("Bea", dec("20")),
            line("Ana", dec("50")),
            line("Bea", dec("20")),
            line("ana", dec("1")),
        ];
        let summary = aggregate(period(), &lines);
        let names = summary
            .rows
            .iter()
            .map(|r| r.salesperson.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Ana", "Bea", "ana"]);
        assert_eq!(summary.get("Bea"), Some(dec("40.00")));
        assert_eq!(summary.get("Ana").unwrap().to_string(), "50.00");
    }

    #[test]
    fn rounds_once_after_summing() {
        let third = dec("100") / dec("3");
        let lines = vec![line("Ana", third), line("Ana", third), line("Ana", third)];
        let summary = aggregate(period(), &lines);
        assert_eq!(summary.get("Ana"), Some(dec("100.00")));
    }

    #[test]
    fn empty_lines_give_empty_summary() {
        let summary = aggregate(period(), &[]);
        assert!(summary.is_empty());
        assert_eq!(summary.total(), dec("0.00"));
    }
}
