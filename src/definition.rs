use crate::calendar::HolidayCalendar;
use crate::error::DefinitionError;
use crate::validation;
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DATE_FORMAT: &str = "%d-%b-%Y";
pub const DEFAULT_VERBOSE_FORMAT: &str = "on {date}, in {days} days";

/// Generative rule of a schedule. Each variant carries only its own parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "kebab-case")]
pub enum Frequency {
    Weekly {
        #[serde(with = "weekday_names")]
        collection_days: Vec<Weekday>,
    },
    EveryNDays {
        period: u32,
        first_date: NaiveDate,
    },
    EveryNWeeks {
        period: u32,
        #[serde(default = "default_first_week")]
        first_week: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_date: Option<NaiveDate>,
        #[serde(with = "weekday_names")]
        collection_days: Vec<Weekday>,
    },
    Monthly {
        #[serde(with = "weekday_names")]
        collection_days: Vec<Weekday>,
        weekday_order_number: Vec<WeekdayOrdinal>,
        #[serde(default = "default_period")]
        period: u32,
        #[serde(default)]
        offset: i64,
        #[serde(default)]
        force_week_order_numbers: bool,
    },
    Annual {
        date: AnnualDate,
    },
    Blank,
}

impl Frequency {
    pub fn name(&self) -> &'static str {
        match self {
            Frequency::Weekly { .. } => "weekly",
            Frequency::EveryNDays { .. } => "every-n-days",
            Frequency::EveryNWeeks { .. } => "every-n-weeks",
            Frequency::Monthly { .. } => "monthly",
            Frequency::Annual { .. } => "annual",
            Frequency::Blank => "blank",
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Frequency::Blank)
    }
}

fn default_first_week() -> u32 {
    1
}

fn default_period() -> u32 {
    1
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_verbose_format() -> String {
    DEFAULT_VERBOSE_FORMAT.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub frequency: Frequency,
    /// Cutoff time of day after which today's collection counts as done.
    #[serde(
        default,
        with = "optional_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub expire_after: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_dates: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holidays: Option<HolidayCalendar>,
    #[serde(default)]
    pub verbose_state: bool,
    /// Periodic refreshes skip this schedule; only explicit commands recompute it.
    #[serde(default)]
    pub manual_update: bool,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_verbose_format")]
    pub verbose_format: String,
}

impl ScheduleDefinition {
    pub fn new(name: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            name: name.into(),
            frequency,
            expire_after: None,
            first_month: None,
            last_month: None,
            include_dates: Vec::new(),
            exclude_dates: Vec::new(),
            holidays: None,
            verbose_state: false,
            manual_update: false,
            date_format: default_date_format(),
            verbose_format: default_verbose_format(),
        }
    }

    pub fn weekly(name: impl Into<String>, collection_days: Vec<Weekday>) -> Self {
        Self::new(name, Frequency::Weekly { collection_days })
    }

    pub fn every_n_days(name: impl Into<String>, period: u32, first_date: NaiveDate) -> Self {
        Self::new(name, Frequency::EveryNDays { period, first_date })
    }

    pub fn every_n_weeks(
        name: impl Into<String>,
        period: u32,
        first_week: u32,
        collection_days: Vec<Weekday>,
    ) -> Self {
        Self::new(
            name,
            Frequency::EveryNWeeks {
                period,
                first_week,
                first_date: None,
                collection_days,
            },
        )
    }

    pub fn monthly(
        name: impl Into<String>,
        collection_days: Vec<Weekday>,
        weekday_order_number: Vec<WeekdayOrdinal>,
        period: u32,
    ) -> Self {
        Self::new(
            name,
            Frequency::Monthly {
                collection_days,
                weekday_order_number,
                period,
                offset: 0,
                force_week_order_numbers: false,
            },
        )
    }

    pub fn annual(name: impl Into<String>, date: AnnualDate) -> Self {
        Self::new(name, Frequency::Annual { date })
    }

    pub fn blank(name: impl Into<String>) -> Self {
        Self::new(name, Frequency::Blank)
    }

    pub fn with_expire_after(mut self, cutoff: NaiveTime) -> Self {
        self.expire_after = Some(cutoff);
        self
    }

    pub fn with_season(mut self, first_month: u32, last_month: u32) -> Self {
        self.first_month = Some(first_month);
        self.last_month = Some(last_month);
        self
    }

    pub fn with_exclude_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.exclude_dates.extend(dates);
        self
    }

    pub fn with_include_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.include_dates.extend(dates);
        self
    }

    pub fn with_holidays(mut self, calendar: HolidayCalendar) -> Self {
        self.holidays = Some(calendar);
        self
    }

    pub fn with_manual_update(mut self) -> Self {
        self.manual_update = true;
        self
    }

    pub fn with_verbose_state(mut self, date_format: &str, verbose_format: &str) -> Self {
        self.verbose_state = true;
        self.date_format = date_format.to_string();
        self.verbose_format = verbose_format.to_string();
        self
    }

    /// Active months, present when either bound is configured.
    pub fn season(&self) -> Option<Season> {
        if self.first_month.is_none() && self.last_month.is_none() {
            return None;
        }
        Some(Season {
            first_month: self.first_month.unwrap_or(1),
            last_month: self.last_month.unwrap_or(12),
        })
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validation::validate_definition(self)
    }
}

/// Inclusive month range, wrapping over the new year when `first_month > last_month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    pub first_month: u32,
    pub last_month: u32,
}

impl Season {
    pub fn contains(&self, month: u32) -> bool {
        if self.first_month <= self.last_month {
            (self.first_month..=self.last_month).contains(&month)
        } else {
            month >= self.first_month || month <= self.last_month
        }
    }
}

/// Which occurrence of a weekday (or calendar week) inside a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OrdinalRepr", into = "String")]
pub enum WeekdayOrdinal {
    Nth(u32),
    Last,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrdinalRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<OrdinalRepr> for WeekdayOrdinal {
    type Error = String;

    fn try_from(value: OrdinalRepr) -> Result<Self, Self::Error> {
        match value {
            OrdinalRepr::Number(-1) => Ok(WeekdayOrdinal::Last),
            OrdinalRepr::Number(n) => u32::try_from(n)
                .map(WeekdayOrdinal::Nth)
                .map_err(|_| format!("invalid weekday_order_number {n}")),
            OrdinalRepr::Text(text) => text.parse(),
        }
    }
}

impl FromStr for WeekdayOrdinal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("last") || trimmed == "-1" {
            return Ok(WeekdayOrdinal::Last);
        }
        trimmed
            .parse::<u32>()
            .map(WeekdayOrdinal::Nth)
            .map_err(|_| format!("invalid weekday_order_number '{s}'"))
    }
}

impl fmt::Display for WeekdayOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekdayOrdinal::Nth(n) => write!(f, "{n}"),
            WeekdayOrdinal::Last => f.write_str("last"),
        }
    }
}

impl From<WeekdayOrdinal> for String {
    fn from(value: WeekdayOrdinal) -> Self {
        value.to_string()
    }
}

/// Fixed month/day of an annual collection, written as `MM/DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnnualDate {
    month: u32,
    day: u32,
}

impl AnnualDate {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2000 is a leap year, so 02/29 is accepted here.
        NaiveDate::from_ymd_opt(2000, month, day).map(|_| Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// The date in `year`; 02/29 falls back to 02/28 outside leap years.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            if self.month == 2 && self.day == 29 {
                NaiveDate::from_ymd_opt(year, 2, 28)
            } else {
                None
            }
        })
    }
}

impl FromStr for AnnualDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("annual date '{s}' must be MM/DD"))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("invalid month in annual date '{s}'"))?;
        let day = day
            .parse::<u32>()
            .map_err(|_| format!("invalid day in annual date '{s}'"))?;
        AnnualDate::new(month, day).ok_or_else(|| format!("annual date '{s}' does not exist"))
    }
}

impl TryFrom<String> for AnnualDate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AnnualDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

impl From<AnnualDate> for String {
    fn from(value: AnnualDate) -> Self {
        value.to_string()
    }
}

pub fn weekday_short_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Collection days as lowercase short names (`["mon", "wed"]`).
mod weekday_names {
    use super::{parse_weekday, weekday_short_name};
    use chrono::Weekday;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|day| weekday_short_name(*day)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Weekday>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                parse_weekday(name).ok_or_else(|| D::Error::custom(format!("unknown weekday '{name}'")))
            })
            .collect()
    }
}

/// `HH:MM` or `HH:MM:SS`.
mod optional_time {
    use chrono::NaiveTime;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format("%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|text| {
            NaiveTime::parse_from_str(&text, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M"))
                .map_err(|_| D::Error::custom(format!("invalid expire_after '{text}'")))
        })
        .transpose()
    }
}
