use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Generated public-holiday calendars that can be used as exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayCalendar {
    UsFederal,
}

impl HolidayCalendar {
    pub fn holidays_in_year(&self, year: i32) -> Vec<NaiveDate> {
        match self {
            HolidayCalendar::UsFederal => us_federal_holidays(year),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays_in_year(date.year()).contains(&date)
    }

    /// Holidays between `start` and `end` (inclusive), ascending.
    pub fn holidays_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = (start.year()..=end.year())
            .flat_map(|year| self.holidays_in_year(year))
            .filter(|date| *date >= start && *date <= end)
            .collect();
        days.sort();
        days
    }
}

/// Standard US federal holidays for a given year
fn us_federal_holidays(year: i32) -> Vec<NaiveDate> {
    [
        // New Year's Day
        NaiveDate::from_ymd_opt(year, 1, 1),
        // Martin Luther King Jr. Day (3rd Monday in January)
        nth_weekday(year, 1, Weekday::Mon, 3),
        // Presidents' Day (3rd Monday in February)
        nth_weekday(year, 2, Weekday::Mon, 3),
        // Memorial Day (last Monday in May)
        last_weekday(year, 5, Weekday::Mon),
        // Independence Day
        NaiveDate::from_ymd_opt(year, 7, 4),
        // Labor Day (1st Monday in September)
        nth_weekday(year, 9, Weekday::Mon, 1),
        // Columbus Day (2nd Monday in October)
        nth_weekday(year, 10, Weekday::Mon, 2),
        // Veterans Day
        NaiveDate::from_ymd_opt(year, 11, 11),
        // Thanksgiving (4th Thursday in November)
        nth_weekday(year, 11, Weekday::Thu, 4),
        // Christmas
        NaiveDate::from_ymd_opt(year, 12, 25),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Find the nth occurrence of a weekday in a month
pub fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }
    let mut date = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut count = 0;

    while date.month() == month {
        if date.weekday() == weekday {
            count += 1;
            if count == n {
                return Some(date);
            }
        }
        date = date + Duration::days(1);
    }
    None
}

/// Find the last occurrence of a weekday in a month
pub fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let mut date = last_day_of_month(year, month)?;
    while date.weekday() != weekday {
        date = date - Duration::days(1);
    }
    Some(date)
}

/// The given weekday inside the nth Monday-based week of a month. Week 1 is the
/// week holding the 1st; days that fall outside the month yield `None`.
pub fn weekday_in_nth_week(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let date = week_start(first)
        + Duration::days(7 * i64::from(n - 1) + i64::from(weekday.num_days_from_monday()));
    (date.year() == year && date.month() == month).then_some(date)
}

/// The given weekday inside the week holding the last day of the month.
pub fn weekday_in_last_week(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    let date = week_start(last) + Duration::days(i64::from(weekday.num_days_from_monday()));
    (date.month() == month).then_some(date)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = next_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1).map(|first| first - Duration::days(1))
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Monday of the week holding `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}
