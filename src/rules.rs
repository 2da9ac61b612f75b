use crate::calendar;
use crate::definition::{AnnualDate, Frequency, ScheduleDefinition, Season, WeekdayOrdinal};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

// Counted in grid steps of `period` months, so long periods never run out.
const MAX_GRID_MONTHS: usize = 480;
// ISO year 2020 has 53 weeks, so every valid `first_week` has a Monday in it.
const ISO_ANCHOR_YEAR: i32 = 2020;
const MAX_SEASON_HOPS: usize = 24;

/// Where an every-n-weeks cadence is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekAnchor {
    /// ISO week number of 2020; the cadence then runs on absolute weeks.
    IsoWeek(u32),
    /// Absolute week holding this date; weeks before it produce nothing.
    Date(NaiveDate),
}

/// Earliest date that can still hold a collection at `reference`.
///
/// Once the time of day reaches `cutoff`, today's occurrence counts as
/// consumed and the search starts tomorrow.
pub fn first_eligible_date(reference: NaiveDateTime, cutoff: Option<NaiveTime>) -> NaiveDate {
    let today = reference.date();
    match cutoff {
        Some(cutoff) if reference.time() >= cutoff => today + Duration::days(1),
        _ => today,
    }
}

/// Next rule-derived collection at or after `reference`, ignoring exceptions.
pub fn next_occurrence(
    definition: &ScheduleDefinition,
    reference: NaiveDateTime,
    cutoff: Option<NaiveTime>,
) -> Option<NaiveDate> {
    next_on_or_after(definition, first_eligible_date(reference, cutoff))
}

/// Occurrence strictly after `date`; used to step past excluded candidates.
pub fn following_occurrence(definition: &ScheduleDefinition, date: NaiveDate) -> Option<NaiveDate> {
    next_on_or_after(definition, date + Duration::days(1))
}

pub fn next_on_or_after(definition: &ScheduleDefinition, from: NaiveDate) -> Option<NaiveDate> {
    let season = definition.season();
    let anchor_month = season.map_or(1, |s| s.first_month);
    let mut from = from;
    for _ in 0..MAX_SEASON_HOPS {
        let candidate = frequency_candidate(&definition.frequency, anchor_month, from)?;
        match season {
            Some(season) if !season.contains(candidate.month()) => {
                from = next_season_start(season, candidate)?;
            }
            _ => return Some(candidate),
        }
    }
    None
}

fn frequency_candidate(frequency: &Frequency, anchor_month: u32, from: NaiveDate) -> Option<NaiveDate> {
    match frequency {
        Frequency::Weekly { collection_days } => weekly(collection_days, from),
        Frequency::EveryNDays { period, first_date } => every_n_days(*first_date, *period, from),
        Frequency::EveryNWeeks {
            period,
            first_week,
            first_date,
            collection_days,
        } => {
            let anchor = match first_date {
                Some(date) => WeekAnchor::Date(*date),
                None => WeekAnchor::IsoWeek(*first_week),
            };
            every_n_weeks(anchor, *period, collection_days, from)
        }
        Frequency::Monthly {
            collection_days,
            weekday_order_number,
            period,
            offset,
            force_week_order_numbers,
        } => monthly(
            &MonthlyRule {
                collection_days,
                ordinals: weekday_order_number,
                period: *period,
                offset: *offset,
                by_week: *force_week_order_numbers,
                anchor_month,
            },
            from,
        ),
        Frequency::Annual { date } => annual(*date, from),
        Frequency::Blank => None,
    }
}

fn next_season_start(season: Season, after: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(after.year(), season.first_month, 1)?;
    if this_year > after {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(after.year() + 1, season.first_month, 1)
    }
}

pub fn weekly(collection_days: &[Weekday], from: NaiveDate) -> Option<NaiveDate> {
    (0..7)
        .map(|offset| from + Duration::days(offset))
        .find(|date| collection_days.contains(&date.weekday()))
}

pub fn every_n_days(first_date: NaiveDate, period: u32, from: NaiveDate) -> Option<NaiveDate> {
    if period == 0 {
        return None;
    }
    if from <= first_date {
        return Some(first_date);
    }
    let period = i64::from(period);
    let elapsed = (from - first_date).num_days();
    let steps = (elapsed + period - 1) / period;
    first_date.checked_add_signed(Duration::days(steps * period))
}

pub fn every_n_weeks(
    anchor: WeekAnchor,
    period: u32,
    collection_days: &[Weekday],
    from: NaiveDate,
) -> Option<NaiveDate> {
    if period == 0 || collection_days.is_empty() {
        return None;
    }
    let mut days = collection_days.to_vec();
    days.sort_by_key(|day| day.num_days_from_monday());

    let epoch = anchor_monday(anchor)?;
    let from = match anchor {
        WeekAnchor::Date(_) => from.max(epoch),
        WeekAnchor::IsoWeek(_) => from,
    };
    let stride = i64::from(period) * 7;
    let since = (calendar::week_start(from) - epoch).num_days();
    let mut steps = since.div_euclid(stride);
    if since.rem_euclid(stride) != 0 {
        steps += 1;
    }
    // The first collection week may already be past its last collection day.
    for step in [steps, steps + 1] {
        let monday = epoch.checked_add_signed(Duration::days(step.checked_mul(stride)?))?;
        let hit = days
            .iter()
            .filter_map(|day| {
                monday.checked_add_signed(Duration::days(i64::from(day.num_days_from_monday())))
            })
            .find(|date| *date >= from);
        if hit.is_some() {
            return hit;
        }
    }
    None
}

fn anchor_monday(anchor: WeekAnchor) -> Option<NaiveDate> {
    match anchor {
        WeekAnchor::IsoWeek(week) => NaiveDate::from_isoywd_opt(ISO_ANCHOR_YEAR, week, Weekday::Mon),
        WeekAnchor::Date(date) => Some(calendar::week_start(date)),
    }
}

struct MonthlyRule<'a> {
    collection_days: &'a [Weekday],
    ordinals: &'a [WeekdayOrdinal],
    period: u32,
    offset: i64,
    by_week: bool,
    anchor_month: u32,
}

impl MonthlyRule<'_> {
    /// First grid month index at or after `index` (months counted as year * 12 + month - 1).
    fn first_grid_index(&self, index: i64) -> i64 {
        let anchor = i64::from(self.anchor_month) - 1;
        index + (anchor - index).rem_euclid(i64::from(self.period))
    }

    fn resolve(&self, year: i32, month: u32, weekday: Weekday, ordinal: WeekdayOrdinal) -> Option<NaiveDate> {
        match (ordinal, self.by_week) {
            (WeekdayOrdinal::Nth(n), false) => calendar::nth_weekday(year, month, weekday, n),
            (WeekdayOrdinal::Last, false) => calendar::last_weekday(year, month, weekday),
            (WeekdayOrdinal::Nth(n), true) => calendar::weekday_in_nth_week(year, month, weekday, n),
            (WeekdayOrdinal::Last, true) => calendar::weekday_in_last_week(year, month, weekday),
        }
    }
}

fn monthly(rule: &MonthlyRule<'_>, from: NaiveDate) -> Option<NaiveDate> {
    if rule.period == 0 {
        return None;
    }
    // The offset shifts every candidate equally, so search the unshifted dates.
    let base_from = from.checked_sub_signed(Duration::days(rule.offset))?;
    let mut index =
        rule.first_grid_index(i64::from(base_from.year()) * 12 + i64::from(base_from.month()) - 1);
    for _ in 0..MAX_GRID_MONTHS {
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = u32::try_from(index.rem_euclid(12) + 1).ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)?;
        let best = rule
            .collection_days
            .iter()
            .flat_map(|weekday| {
                rule.ordinals
                    .iter()
                    .filter_map(move |ordinal| rule.resolve(year, month, *weekday, *ordinal))
            })
            .filter(|date| *date >= base_from)
            .min();
        if let Some(date) = best {
            return date.checked_add_signed(Duration::days(rule.offset));
        }
        index += i64::from(rule.period);
    }
    None
}

pub fn annual(date: AnnualDate, from: NaiveDate) -> Option<NaiveDate> {
    let this_year = date.in_year(from.year())?;
    if this_year >= from {
        Some(this_year)
    } else {
        date.in_year(from.year() + 1)
    }
}
