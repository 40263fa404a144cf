//! Calendar arithmetic for the scheduling dialogs.
//!
//! "Native" weekday numbering is 0 = Sunday .. 6 = Saturday (the numbering
//! calendar widgets hand us); the backend speaks ISO, 1 = Monday .. 7 = Sunday.

use std::collections::BTreeSet;

use time::{Date, Month, Weekday};

use crate::error::{ClientError, Result};

/// Converts 0 = Sunday .. 6 = Saturday into ISO 1 = Monday .. 7 = Sunday.
pub fn native_to_iso(native: u8) -> Option<u8> {
    match native {
        0 => Some(7),
        1..=6 => Some(native),
        _ => None,
    }
}

pub fn iso_weekday(date: Date) -> u8 {
    // native_to_iso only fails above 6
    native_to_iso(date.weekday().number_days_from_sunday()).unwrap_or(7)
}

pub fn weekday_from_iso(iso: u8) -> Result<Weekday> {
    let weekday = match iso {
        1 => Weekday::Monday,
        2 => Weekday::Tuesday,
        3 => Weekday::Wednesday,
        4 => Weekday::Thursday,
        5 => Weekday::Friday,
        6 => Weekday::Saturday,
        7 => Weekday::Sunday,
        _ => {
            return Err(ClientError::InvalidInput(format!(
                "day of week must be between 1 (Monday) and 7 (Sunday), got {iso}"
            )))
        }
    };
    Ok(weekday)
}

pub fn month_from_number(month: u8) -> Result<Month> {
    Month::try_from(month)
        .map_err(|_| ClientError::InvalidInput(format!("month must be between 1 and 12, got {month}")))
}

pub fn first_of_month(year: i32, month: u8) -> Result<Date> {
    Date::from_calendar_date(year, month_from_number(month)?, 1)
        .map_err(|e| ClientError::InvalidInput(format!("invalid month {year}-{month}: {e}")))
}

pub fn last_of_month(year: i32, month: u8) -> Result<Date> {
    let m = month_from_number(month)?;
    Date::from_calendar_date(year, m, m.length(year))
        .map_err(|e| ClientError::InvalidInput(format!("invalid month {year}-{month}: {e}")))
}

/// Strictly before today; today itself is still schedulable.
pub fn is_past(date: Date, today: Date) -> bool {
    date < today
}

/// Every date in `year`/`month` falling on `iso_weekday`, ascending, with
/// dates before `today` left out. An empty result is not an error here.
pub fn recurring_dates(year: i32, month: u8, iso_weekday: u8, today: Date) -> Result<Vec<Date>> {
    let weekday = weekday_from_iso(iso_weekday)?;
    let first = first_of_month(year, month)?;
    let last = last_of_month(year, month)?;

    let mut dates = Vec::new();
    let mut day = first;
    while day <= last {
        if day.weekday() == weekday && !is_past(day, today) {
            dates.push(day);
        }
        match day.next_day() {
            Some(next) => day = next,
            None => break,
        }
    }
    Ok(dates)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self> {
        month_from_number(month)?;
        Ok(Self { year, month })
    }

    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month() as u8,
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }
}

/// Source month for "copy from previous month": always the month before the
/// target, rolling the year back in January.
pub fn copy_source(target_month: u8, target_year: i32) -> Result<YearMonth> {
    Ok(YearMonth::new(target_year, target_month)?.previous())
}

/// A month can be written to when it is the current month or later.
pub fn can_modify_month(year: i32, month: u8, today: Date) -> Result<bool> {
    Ok(first_of_month(year, month)? >= first_of_month(today.year(), today.month() as u8)?)
}

/// A month is past once its last day is before today.
pub fn is_past_month(year: i32, month: u8, today: Date) -> Result<bool> {
    Ok(last_of_month(year, month)? < today)
}

/// Explicit multi-date pick: one entry per calendar day, always ascending,
/// past days refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateSelection {
    dates: BTreeSet<Date>,
}

impl DateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the day was already selected.
    pub fn add(&mut self, date: Date, today: Date) -> Result<bool> {
        if is_past(date, today) {
            return Err(ClientError::InvalidInput(format!(
                "{date} is in the past and cannot be scheduled"
            )));
        }
        Ok(self.dates.insert(date))
    }

    pub fn remove(&mut self, date: Date) -> bool {
        self.dates.remove(&date)
    }

    pub fn clear(&mut self) {
        self.dates.clear();
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<Date> {
        self.dates.first().copied()
    }

    pub fn to_vec(&self) -> Vec<Date> {
        self.dates.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Date> + '_ {
        self.dates.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn native_to_iso_maps_sunday_to_seven() {
        for native in 0..=6u8 {
            let iso = native_to_iso(native).unwrap();
            assert!((1..=7).contains(&iso));
            assert_eq!(iso == 7, native == 0);
        }
        assert_eq!(native_to_iso(7), None);
    }

    #[test]
    fn iso_weekday_agrees_with_calendar() {
        // 2025-06-15 is a Sunday, 2025-06-16 a Monday
        assert_eq!(iso_weekday(date!(2025 - 06 - 15)), 7);
        assert_eq!(iso_weekday(date!(2025 - 06 - 16)), 1);
        let mut day = date!(2025 - 06 - 01);
        for _ in 0..14 {
            assert_eq!(iso_weekday(day), day.weekday().number_from_monday());
            day = day.next_day().unwrap();
        }
    }

    #[test]
    fn recurring_dates_skip_past_mondays() {
        let dates = recurring_dates(2025, 6, 1, date!(2025 - 06 - 15)).unwrap();
        assert_eq!(
            dates,
            vec![date!(2025 - 06 - 16), date!(2025 - 06 - 23), date!(2025 - 06 - 30)]
        );
    }

    #[test]
    fn recurring_dates_include_today() {
        let dates = recurring_dates(2025, 6, 7, date!(2025 - 06 - 15)).unwrap();
        assert_eq!(
            dates,
            vec![date!(2025 - 06 - 15), date!(2025 - 06 - 22), date!(2025 - 06 - 29)]
        );
    }

    #[test]
    fn recurring_dates_wholly_past_is_empty() {
        let dates = recurring_dates(2025, 5, 3, date!(2025 - 06 - 15)).unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn recurring_dates_reject_bad_input() {
        assert!(recurring_dates(2025, 13, 1, date!(2025 - 06 - 15)).is_err());
        assert!(recurring_dates(2025, 6, 0, date!(2025 - 06 - 15)).is_err());
        assert!(recurring_dates(2025, 6, 8, date!(2025 - 06 - 15)).is_err());
    }

    #[test]
    fn recurring_dates_handle_leap_february() {
        let dates = recurring_dates(2028, 2, 2, date!(2028 - 01 - 01)).unwrap();
        assert_eq!(dates.last(), Some(&date!(2028 - 02 - 29)));
        assert_eq!(dates.len(), 5);
    }

    #[test]
    fn copy_source_rolls_year_back_in_january() {
        assert_eq!(copy_source(1, 2026).unwrap(), YearMonth { year: 2025, month: 12 });
        assert_eq!(copy_source(6, 2025).unwrap(), YearMonth { year: 2025, month: 5 });
        assert!(copy_source(0, 2025).is_err());
    }

    #[test]
    fn month_navigation_wraps() {
        let dec = YearMonth::new(2025, 12).unwrap();
        assert_eq!(dec.next(), YearMonth { year: 2026, month: 1 });
        assert_eq!(dec.next().previous(), dec);
    }

    #[test]
    fn month_writability() {
        let today = date!(2025 - 06 - 15);
        assert!(can_modify_month(2025, 6, today).unwrap());
        assert!(can_modify_month(2025, 7, today).unwrap());
        assert!(!can_modify_month(2025, 5, today).unwrap());
        assert!(is_past_month(2025, 5, today).unwrap());
        assert!(!is_past_month(2025, 6, today).unwrap());
    }

    #[test]
    fn selection_dedups_by_day_and_sorts() {
        let today = date!(2025 - 07 - 01);
        let mut sel = DateSelection::new();
        assert!(sel.add(date!(2025 - 07 - 12), today).unwrap());
        assert!(sel.add(date!(2025 - 07 - 10), today).unwrap());
        assert!(!sel.add(date!(2025 - 07 - 12), today).unwrap());

        assert_eq!(sel.len(), 2);
        assert_eq!(sel.to_vec(), vec![date!(2025 - 07 - 10), date!(2025 - 07 - 12)]);
    }

    #[test]
    fn selection_refuses_past_days() {
        let mut sel = DateSelection::new();
        let err = sel.add(date!(2025 - 06 - 14), date!(2025 - 06 - 15)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert!(sel.is_empty());
    }
}
