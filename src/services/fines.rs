//! Overdue fine calculation
//!
//! Every started day past the due date is charged in full.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Number of started days between `due` and `at`; zero when not late
pub fn overdue_days(due: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    if at <= due {
        return 0;
    }
    let late = at - due;
    let whole_days = late.num_days();
    if late > Duration::days(whole_days) {
        whole_days + 1
    } else {
        whole_days
    }
}

pub fn overdue_fine(due: DateTime<Utc>, at: DateTime<Utc>, rate_per_day: Decimal) -> Decimal {
    match overdue_days(due, at) {
        0 => Decimal::ZERO,
        days => Decimal::from(days) * rate_per_day,
    }
}
