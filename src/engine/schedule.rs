//! Installment schedule computation.
//!
//! Pure and deterministic: identical inputs always produce the identical
//! schedule, and no I/O happens here.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::error::CreditError;

pub const MIN_INSTALLMENT_COUNT: i32 = 1;
pub const MAX_INSTALLMENT_COUNT: i32 = 12;

/// Currency minor unit.
const AMOUNT_SCALE: u32 = 2;

/// One computed (amount, due date) pair, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInstallment {
    pub installment_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Days between consecutive due dates for a given installment count.
///
/// The 30-day plan: a single installment falls due after one week, two
/// installments split the month at day 15 and 30, anything else pays
/// weekly.
fn days_between(installment_count: i32) -> i64 {
    match installment_count {
        1 => 7,
        2 => 15,
        _ => 7,
    }
}

/// Build the installment sequence for an order.
///
/// Installments 1..N-1 carry the per-installment base (total / count,
/// rounded to the minor unit); the final installment absorbs all rounding
/// drift so the sequence sums exactly to `order_total`.
pub fn build_schedule(
    order_total: Decimal,
    installment_count: i32,
    order_date: NaiveDate,
) -> Result<Vec<ScheduledInstallment>, CreditError> {
    if !(MIN_INSTALLMENT_COUNT..=MAX_INSTALLMENT_COUNT).contains(&installment_count) {
        return Err(CreditError::Precondition(format!(
            "installment count must be between {} and {}, got {}",
            MIN_INSTALLMENT_COUNT, MAX_INSTALLMENT_COUNT, installment_count
        )));
    }
    if order_total < Decimal::ZERO {
        return Err(CreditError::Precondition(format!(
            "order total must not be negative, got {}",
            order_total
        )));
    }

    let base = (order_total / Decimal::from(installment_count)).round_dp(AMOUNT_SCALE);
    let spacing = days_between(installment_count);

    let mut schedule = Vec::with_capacity(installment_count as usize);
    for i in 1..=installment_count {
        let amount = if i == installment_count {
            order_total - base * Decimal::from(installment_count - 1)
        } else {
            base
        };
        schedule.push(ScheduledInstallment {
            installment_number: i,
            amount,
            due_date: order_date + Duration::days(spacing * i64::from(i)),
        });
    }

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn four_installments_pay_weekly() {
        let schedule = build_schedule(dec("10000.00"), 4, date(2026, 1, 1)).unwrap();
        let due: Vec<NaiveDate> = schedule.iter().map(|s| s.due_date).collect();
        assert_eq!(
            due,
            vec![
                date(2026, 1, 8),
                date(2026, 1, 15),
                date(2026, 1, 22),
                date(2026, 1, 29),
            ]
        );
        assert!(schedule.iter().all(|s| s.amount == dec("2500.00")));
    }

    #[test]
    fn two_installments_split_the_month() {
        let schedule = build_schedule(dec("3000.00"), 2, date(2026, 1, 1)).unwrap();
        assert_eq!(schedule[0].due_date, date(2026, 1, 16));
        assert_eq!(schedule[1].due_date, date(2026, 1, 31));
    }

    #[test]
    fn single_installment_falls_due_after_a_week() {
        let schedule = build_schedule(dec("500.00"), 1, date(2026, 1, 1)).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].due_date, date(2026, 1, 8));
        assert_eq!(schedule[0].amount, dec("500.00"));
    }

    #[test]
    fn final_installment_absorbs_rounding_drift() {
        let schedule = build_schedule(dec("999.99"), 4, date(2026, 1, 1)).unwrap();
        let amounts: Vec<Decimal> = schedule.iter().map(|s| s.amount).collect();
        assert_eq!(
            amounts,
            vec![dec("250.00"), dec("250.00"), dec("250.00"), dec("249.99")]
        );
        let total: Decimal = amounts.iter().copied().sum();
        assert_eq!(total, dec("999.99"));
    }

    #[test]
    fn rejects_out_of_range_count() {
        assert!(matches!(
            build_schedule(dec("100.00"), 0, date(2026, 1, 1)),
            Err(CreditError::Precondition(_))
        ));
        assert!(matches!(
            build_schedule(dec("100.00"), 13, date(2026, 1, 1)),
            Err(CreditError::Precondition(_))
        ));
    }

    #[test]
    fn rejects_negative_total() {
        assert!(matches!(
            build_schedule(dec("-0.01"), 4, date(2026, 1, 1)),
            Err(CreditError::Precondition(_))
        ));
    }
}
