use time::Date;

use crate::reading::Timestamped;

/// Elements whose timestamp falls on `date`, in input order.
///
/// An absent date yields an empty vector.
pub fn filter_by_date<T: Timestamped + Clone>(series: &[T], date: Date) -> Vec<T> {
    series
        .iter()
        .filter(|item| item.date() == date)
        .cloned()
        .collect()
}

/// Date of the last element of a chronologically sorted series; the default
/// day to show when none was requested.
pub fn latest_date<T: Timestamped>(series: &[T]) -> Option<Date> {
    series.last().map(Timestamped::date)
}

/// Distinct dates present in the series, oldest first.
pub fn available_dates<T: Timestamped>(series: &[T]) -> Vec<Date> {
    let mut dates: Vec<Date> = series.iter().map(Timestamped::date).collect();
    dates.sort_unstable();
    dates.dedup();
    dates
}
