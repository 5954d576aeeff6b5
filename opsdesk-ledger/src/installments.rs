use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::ledger::LedgerError;

/// Hard ceiling on installment count. A safety rail against fat-fingered
/// input, not a business rule.
pub const MAX_INSTALLMENTS: u32 = 60;

/// One slice of a split total: what to charge, when, and its 1-based
/// position within the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installment {
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub number: u32,
}

/// Split `total` into `count` monthly installments starting at `start`.
///
/// Installments 1..count-1 each carry the half-up-rounded base amount; the
/// last one carries the remainder, so the amounts always sum to `total`
/// exactly regardless of rounding. Due dates advance one calendar month per
/// installment, clamped to the last valid day of the target month (a start
/// on Jan 31 yields Feb 28/29, Mar 31, ...).
///
/// Pure function; writes nothing.
pub fn split(
    total: Decimal,
    count: u32,
    start: NaiveDate,
) -> Result<Vec<Installment>, LedgerError> {
    if count == 0 || count > MAX_INSTALLMENTS {
        return Err(LedgerError::InvalidInstallmentCount(count));
    }

    let base = (total / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let amount = if i == count - 1 {
            total - base * Decimal::from(count - 1)
        } else {
            base
        };
        let due_date = start
            .checked_add_months(Months::new(i))
            .ok_or(LedgerError::DueDateOutOfRange)?;
        out.push(Installment {
            amount,
            due_date,
            number: i + 1,
        });
    }
    Ok(out)
}
