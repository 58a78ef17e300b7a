//! Rent billing periods.
//!
//! A lease is billed in calendar-month windows anchored at its start date:
//! window `k` runs from `start + k months` (inclusive) to `start + (k+1) months`
//! (exclusive). Anchoring every window at the start date keeps a lease that
//! begins on the 31st billing on the 31st (or the month's last day) instead of
//! drifting to the 28th after February.
//!
//! The next window to pay is derived from the payment history alone:
//! the window of the latest completed payment stays open until the completed
//! amounts recorded in it reach the rent, after which billing moves on to the
//! following window.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::db::{LeaseContract, Payment, PaymentStatus};

/// Calendar dates are stored as `YYYY-MM-DD`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BillingError {
    #[error("due day must be between 1 and 31, got {0}")]
    InvalidDueDay(i64),
    #[error("rent amount must be positive")]
    InvalidRent,
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("lease has been billed through its end date")]
    LeaseSettled,
    #[error("billing date out of range")]
    DateOverflow,
}

/// The parts of a lease that drive billing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseTerms {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub rent_amount: i64,
    pub due_day: u32,
}

impl LeaseTerms {
    fn validate(&self) -> Result<(), BillingError> {
        if self.rent_amount <= 0 {
            return Err(BillingError::InvalidRent);
        }
        if !(1..=31).contains(&self.due_day) {
            return Err(BillingError::InvalidDueDay(self.due_day as i64));
        }
        Ok(())
    }
}

impl TryFrom<&LeaseContract> for LeaseTerms {
    type Error = BillingError;

    fn try_from(lease: &LeaseContract) -> Result<Self, Self::Error> {
        if !(1..=31).contains(&lease.due_day) {
            return Err(BillingError::InvalidDueDay(lease.due_day));
        }
        Ok(Self {
            start_date: parse_date(&lease.start_date)?,
            end_date: lease.end_date.as_deref().map(parse_date).transpose()?,
            rent_amount: lease.rent_amount,
            due_day: lease.due_day as u32,
        })
    }
}

/// A payment as billing sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub period_start: NaiveDate,
    pub amount: i64,
    pub status: PaymentStatus,
}

impl TryFrom<&Payment> for PaymentRecord {
    type Error = BillingError;

    fn try_from(payment: &Payment) -> Result<Self, Self::Error> {
        Ok(Self {
            period_start: parse_date(&payment.period_start)?,
            amount: payment.amount,
            status: payment.status_enum(),
        })
    }
}

/// The window a lease should be paid for next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    pub period_start: NaiveDate,
    /// Exclusive
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub amount_due: i64,
    /// Completed payments already recorded in this window
    pub amount_paid: i64,
    /// Payments in this window still awaiting confirmation
    pub amount_pending: i64,
    pub outstanding: i64,
    /// True when part of this window's rent has been paid
    pub is_partial: bool,
}

impl BillingPeriod {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.outstanding > 0 && today > self.due_date
    }

    /// What can still be paid without over-paying once pending payments clear
    pub fn payable_now(&self) -> i64 {
        (self.outstanding - self.amount_pending).max(0)
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, BillingError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| BillingError::InvalidDate(value.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn anchor(start: NaiveDate, k: u32) -> Result<NaiveDate, BillingError> {
    start
        .checked_add_months(Months::new(k))
        .ok_or(BillingError::DateOverflow)
}

/// Bounds of the billing window containing `date`. Dates before the lease
/// start map to the first window.
pub fn window_containing(
    start: NaiveDate,
    date: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), BillingError> {
    let mut k = if date <= start {
        0
    } else {
        let months = (date.year() - start.year()) * 12 + date.month() as i32 - start.month() as i32;
        months.max(0) as u32
    };
    while k > 0 && anchor(start, k)? > date {
        k -= 1;
    }
    Ok((anchor(start, k)?, anchor(start, k + 1)?))
}

fn clamped_day(year: i32, month: u32, day: u32) -> Result<NaiveDate, BillingError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(BillingError::DateOverflow)?;
    let last_day = anchor(first, 1)?.pred_opt().ok_or(BillingError::DateOverflow)?.day();
    NaiveDate::from_ymd_opt(year, month, day.min(last_day)).ok_or(BillingError::DateOverflow)
}

/// Rent for a window falls due on `due_day` of the window's first month,
/// or of the following month when that day precedes the window start.
pub fn due_date_for(period_start: NaiveDate, due_day: u32) -> Result<NaiveDate, BillingError> {
    let candidate = clamped_day(period_start.year(), period_start.month(), due_day)?;
    if candidate >= period_start {
        return Ok(candidate);
    }
    let next_month = anchor(period_start.with_day(1).ok_or(BillingError::DateOverflow)?, 1)?;
    clamped_day(next_month.year(), next_month.month(), due_day)
}

fn sum_in_window(
    payments: &[PaymentRecord],
    status: PaymentStatus,
    (start, end): (NaiveDate, NaiveDate),
) -> i64 {
    payments
        .iter()
        .filter(|p| p.status == status && p.period_start >= start && p.period_start < end)
        .map(|p| p.amount)
        .sum()
}

/// Derive the next unpaid (or partially paid) billing window of a lease.
pub fn next_billing_period(
    terms: &LeaseTerms,
    payments: &[PaymentRecord],
) -> Result<BillingPeriod, BillingError> {
    terms.validate()?;

    let latest_completed = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.period_start)
        .max();

    let (window, amount_paid) = match latest_completed {
        None => (window_containing(terms.start_date, terms.start_date)?, 0),
        Some(latest) => {
            let window = window_containing(terms.start_date, latest)?;
            let paid = sum_in_window(payments, PaymentStatus::Completed, window);
            if paid < terms.rent_amount {
                (window, paid)
            } else {
                (window_containing(terms.start_date, window.1)?, 0)
            }
        }
    };

    if let Some(end_date) = terms.end_date {
        if window.0 >= end_date {
            return Err(BillingError::LeaseSettled);
        }
    }

    let amount_pending = sum_in_window(payments, PaymentStatus::Pending, window);

    Ok(BillingPeriod {
        period_start: window.0,
        period_end: window.1,
        due_date: due_date_for(window.0, terms.due_day)?,
        amount_due: terms.rent_amount,
        amount_paid,
        amount_pending,
        outstanding: terms.rent_amount - amount_paid,
        is_partial: amount_paid > 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn terms(start: &str, rent: i64, due_day: u32) -> LeaseTerms {
        LeaseTerms {
            start_date: date(start),
            end_date: None,
            rent_amount: rent,
            due_day,
        }
    }

    fn paid(period_start: &str, amount: i64) -> PaymentRecord {
        PaymentRecord {
            period_start: date(period_start),
            amount,
            status: PaymentStatus::Completed,
        }
    }

    fn with_status(period_start: &str, amount: i64, status: PaymentStatus) -> PaymentRecord {
        PaymentRecord {
            period_start: date(period_start),
            amount,
            status,
        }
    }

    #[test]
    fn test_first_period_starts_at_lease_start() {
        let period = next_billing_period(&terms("2026-03-10", 100_000, 10), &[]).unwrap();
        assert_eq!(period.period_start, date("2026-03-10"));
        assert_eq!(period.period_end, date("2026-04-10"));
        assert_eq!(period.due_date, date("2026-03-10"));
        assert_eq!(period.outstanding, 100_000);
        assert!(!period.is_partial);
    }

    #[test]
    fn test_full_payment_advances_one_month() {
        let period = next_billing_period(
            &terms("2026-03-10", 100_000, 10),
            &[paid("2026-03-10", 100_000)],
        )
        .unwrap();
        assert_eq!(period.period_start, date("2026-04-10"));
        assert_eq!(period.period_end, date("2026-05-10"));
        assert_eq!(period.amount_paid, 0);
    }

    #[test]
    fn test_partial_payment_keeps_period_open() {
        let period = next_billing_period(
            &terms("2026-03-10", 100_000, 10),
            &[paid("2026-03-10", 100_000), paid("2026-04-10", 40_000)],
        )
        .unwrap();
        assert_eq!(period.period_start, date("2026-04-10"));
        assert_eq!(period.amount_paid, 40_000);
        assert_eq!(period.outstanding, 60_000);
        assert!(period.is_partial);
    }

    #[test]
    fn test_split_payments_complete_a_period() {
        let period = next_billing_period(
            &terms("2026-03-10", 100_000, 10),
            &[paid("2026-03-10", 60_000), paid("2026-03-10", 40_000)],
        )
        .unwrap();
        assert_eq!(period.period_start, date("2026-04-10"));
        assert!(!period.is_partial);
    }

    #[test]
    fn test_overpayment_counts_as_paid() {
        let period = next_billing_period(
            &terms("2026-03-10", 100_000, 10),
            &[paid("2026-03-10", 120_000)],
        )
        .unwrap();
        assert_eq!(period.period_start, date("2026-04-10"));
    }

    #[test]
    fn test_non_completed_payments_do_not_advance() {
        let payments = [
            with_status("2026-03-10", 100_000, PaymentStatus::Failed),
            with_status("2026-03-10", 100_000, PaymentStatus::Cancelled),
            with_status("2026-03-10", 30_000, PaymentStatus::Pending),
        ];
        let period = next_billing_period(&terms("2026-03-10", 100_000, 10), &payments).unwrap();
        assert_eq!(period.period_start, date("2026-03-10"));
        assert_eq!(period.amount_paid, 0);
        assert_eq!(period.amount_pending, 30_000);
        assert_eq!(period.payable_now(), 70_000);
    }

    #[test]
    fn test_latest_completed_period_wins_regardless_of_order() {
        let payments = [
            paid("2026-05-10", 100_000),
            paid("2026-03-10", 100_000),
            paid("2026-04-10", 100_000),
        ];
        let period = next_billing_period(&terms("2026-03-10", 100_000, 10), &payments).unwrap();
        assert_eq!(period.period_start, date("2026-06-10"));
    }

    #[test]
    fn test_month_end_anchor_does_not_drift() {
        let t = terms("2026-01-31", 50_000, 31);
        let p1 = next_billing_period(&t, &[paid("2026-01-31", 50_000)]).unwrap();
        assert_eq!(p1.period_start, date("2026-02-28"));
        assert_eq!(p1.period_end, date("2026-03-31"));
        assert_eq!(p1.due_date, date("2026-02-28"));

        let p2 = next_billing_period(
            &t,
            &[paid("2026-01-31", 50_000), paid("2026-02-28", 50_000)],
        )
        .unwrap();
        assert_eq!(p2.period_start, date("2026-03-31"));
        assert_eq!(p2.period_end, date("2026-04-30"));
    }

    #[test]
    fn test_due_date_rolls_into_following_month() {
        assert_eq!(due_date_for(date("2026-01-15"), 1).unwrap(), date("2026-02-01"));
        assert_eq!(due_date_for(date("2026-01-15"), 20).unwrap(), date("2026-01-20"));
        assert_eq!(due_date_for(date("2026-01-31"), 30).unwrap(), date("2026-02-28"));
        assert_eq!(due_date_for(date("2028-02-01"), 31).unwrap(), date("2028-02-29"));
    }

    #[test]
    fn test_lease_end_stops_billing() {
        let mut t = terms("2026-01-01", 10_000, 1);
        t.end_date = Some(date("2026-03-01"));
        assert!(next_billing_period(&t, &[paid("2026-01-01", 10_000)]).is_ok());
        assert_eq!(
            next_billing_period(&t, &[paid("2026-01-01", 10_000), paid("2026-02-01", 10_000)]),
            Err(BillingError::LeaseSettled)
        );
    }

    #[test]
    fn test_invalid_terms() {
        assert_eq!(
            next_billing_period(&terms("2026-01-01", 0, 1), &[]),
            Err(BillingError::InvalidRent)
        );
        assert_eq!(
            next_billing_period(&terms("2026-01-01", 100, 32), &[]),
            Err(BillingError::InvalidDueDay(32))
        );
    }

    #[test]
    fn test_window_containing_unaligned_dates() {
        let start = date("2026-01-31");
        assert_eq!(
            window_containing(start, date("2026-03-15")).unwrap(),
            (date("2026-02-28"), date("2026-03-31"))
        );
        assert_eq!(
            window_containing(start, date("2025-12-01")).unwrap(),
            (date("2026-01-31"), date("2026-02-28"))
        );
    }

    #[test]
    fn test_overdue() {
        let period = next_billing_period(&terms("2026-03-10", 100_000, 15), &[]).unwrap();
        assert!(!period.is_overdue(date("2026-03-15")));
        assert!(period.is_overdue(date("2026-03-16")));
    }
}
