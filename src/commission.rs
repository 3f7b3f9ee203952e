use log::debug;
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    diagnostics::{Diagnostics, SkipReason},
    model::{CommissionLine, MatchedRecord},
};

/// A usable installment count is a whole number above zero. `2.0` from a
/// spreadsheet float is accepted; `0`, `-1` and `2.5` are not.
pub fn installment_count(value: Option<Decimal>) -> Option<u32> {
    let value = value?;
    if value <= Decimal::ZERO || !value.fract().is_zero() {
        return None;
    }
    value.to_u32()
}

/// `total = base × percentage / 100`, `per_installment = total / installments`.
///
/// Checks run in a fixed order (installments, base value, percentage,
/// salesperson) and the first failure is the reported reason. Nothing is
/// divided until the installment count is known to be positive.
pub fn compute_line(record: &MatchedRecord) -> Result<CommissionLine, SkipReason> {
    let installments =
        installment_count(record.installments).ok_or(SkipReason::InvalidInstallmentCount)?;
    let base_value = record.base_value.ok_or(SkipReason::MissingBaseValue)?;
    let percentage = record.percentage.ok_or(SkipReason::MissingPercentage)?;
    let salesperson = record
        .salesperson
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingSalesperson)?;

    let total = base_value
        .checked_mul(percentage)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(SkipReason::ArithmeticOverflow)?;
    let per_installment = total
        .checked_div(Decimal::from(installments))
        .ok_or(SkipReason::ArithmeticOverflow)?;

    Ok(CommissionLine {
        salesperson: salesperson.to_string(),
        contract: record.contract.clone(),
        row: record.row,
        closing_date: record.closing_date,
        base_value,
        percentage,
        installments,
        total,
        per_installment,
    })
}

pub fn compute_lines(matched: &[MatchedRecord], diagnostics: &mut Diagnostics) -> Vec<CommissionLine> {
    let mut lines = Vec::with_capacity(matched.len());
    for record in matched {
        match compute_line(record) {
            Ok(line) => lines.push(line),
            Err(reason) => {
                debug!(
                    "Settlement row {} (contract '{}') excluded: {reason}",
                    record.row, record.contract
                );
                diagnostics.record_skip(record.row, &record.contract, reason);
            }
        }
    }
    diagnostics.lines_computed += lines.len();
    lines
}
