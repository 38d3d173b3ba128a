use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The `count` weekdays following `after`. No holiday calendar.
pub fn next_business_days(after: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count);
    let mut date = after;
    while days.len() < count {
        date = date + Duration::days(1);
        if is_business_day(date) {
            days.push(date);
        }
    }
    days
}
