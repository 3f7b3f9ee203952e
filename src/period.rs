use std::{collections::BTreeSet, fmt, str::FromStr};

use anyhow::{Result, anyhow, ensure};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    diagnostics::{Diagnostics, SkipReason},
    fields::LogicalField,
    matcher::LedgerIndex,
    model::SettlementRecord,
};

/// A billing month. Orders chronologically; renders as `MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        ensure!((1..=12).contains(&month), "Month must be between 01 and 12, got {month}");
        ensure!((1000..=9999).contains(&year), "Year must have four digits, got {year}");
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Period::of(date) == *self
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (month, year) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("Period '{trimmed}' must look like MM/YYYY"))?;
        ensure!(
            (1..=2).contains(&month.len()) && year.len() == 4,
            "Period '{trimmed}' must look like MM/YYYY"
        );
        let month = month
            .parse::<u32>()
            .map_err(|_| anyhow!("Period '{trimmed}' has a non-numeric month"))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| anyhow!("Period '{trimmed}' has a non-numeric year"))?;
        Period::new(month, year)
    }
}

impl Serialize for Period {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Period::from_str(&raw).map_err(de::Error::custom)
    }
}

/// A settlement row that falls inside the selected period, with the date that put it there.
#[derive(Debug, Clone, Copy)]
pub struct InPeriod<'s> {
    pub record: &'s SettlementRecord,
    pub closing_date: NaiveDate,
}

/// The settlement's own closing date, else the ledger's for the same contract.
/// An unparseable settlement date is never replaced.
pub fn effective_date(
    settlement: &SettlementRecord,
    ledger: Option<&LedgerIndex<'_>>,
) -> Option<NaiveDate> {
    if settlement.is_unparsed(LogicalField::ClosingDate) {
        return None;
    }
    settlement.closing_date.or_else(|| {
        ledger
            .and_then(|index| index.get(&settlement.contract))
            .and_then(|sale| sale.closing_date)
    })
}

pub fn filter_period<'s>(
    settlements: &'s [SettlementRecord],
    ledger: &LedgerIndex<'_>,
    target: Period,
    diagnostics: &mut Diagnostics,
) -> Vec<InPeriod<'s>> {
    let mut retained = Vec::new();
    for record in settlements {
        let Some(closing_date) = effective_date(record, Some(ledger)) else {
            let reason = if record.is_unparsed(LogicalField::ClosingDate) {
                SkipReason::UnparseableClosingDate
            } else {
                SkipReason::MissingClosingDate
            };
            diagnostics.record_skip(record.row, &record.contract, reason);
            continue;
        };
        if target.contains(closing_date) {
            retained.push(InPeriod {
                record,
                closing_date,
            });
        } else {
            diagnostics.out_of_period += 1;
        }
    }
    debug!(
        "{} of {} settlement row(s) fall in {target}",
        retained.len(),
        settlements.len()
    );
    retained
}

/// Distinct periods present in the settlement data, oldest first.
pub fn available_periods(
    settlements: &[SettlementRecord],
    ledger: Option<&LedgerIndex<'_>>,
) -> Vec<Period> {
    settlements
        .iter()
        .filter_map(|record| effective_date(record, ledger))
        .map(Period::of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
