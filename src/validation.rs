use crate::definition::{Frequency, ScheduleDefinition, WeekdayOrdinal};
use crate::error::DefinitionError;
use chrono::format::{Item, StrftimeItems};
use chrono::Weekday;

const MAX_WEEKDAY_ORDER: u32 = 5;
const MAX_OFFSET_DAYS: i64 = 31;

pub fn validate_definition(definition: &ScheduleDefinition) -> Result<(), DefinitionError> {
    let frequency = definition.frequency.name();
    match &definition.frequency {
        Frequency::Weekly { collection_days } => {
            require_days(frequency, collection_days)?;
        }
        Frequency::EveryNDays { period, .. } => {
            require_period(frequency, *period)?;
        }
        Frequency::EveryNWeeks {
            period,
            first_week,
            collection_days,
            ..
        } => {
            require_period(frequency, *period)?;
            require_days(frequency, collection_days)?;
            if !(1..=53).contains(first_week) {
                return Err(DefinitionError::InvalidFirstWeek(*first_week));
            }
        }
        Frequency::Monthly {
            collection_days,
            weekday_order_number,
            period,
            offset,
            ..
        } => {
            require_period(frequency, *period)?;
            require_days(frequency, collection_days)?;
            if weekday_order_number.is_empty() {
                return Err(DefinitionError::EmptyWeekdayOrder);
            }
            for ordinal in weekday_order_number {
                if let WeekdayOrdinal::Nth(n) = ordinal {
                    if !(1..=MAX_WEEKDAY_ORDER).contains(n) {
                        return Err(DefinitionError::InvalidWeekdayOrder(*n));
                    }
                }
            }
            if offset.abs() > MAX_OFFSET_DAYS {
                return Err(DefinitionError::OffsetOutOfRange(*offset));
            }
        }
        // AnnualDate can only be built from an existing month/day.
        Frequency::Annual { .. } | Frequency::Blank => {}
    }

    for (field, value) in [
        ("first_month", definition.first_month),
        ("last_month", definition.last_month),
    ] {
        if let Some(month) = value {
            if !(1..=12).contains(&month) {
                return Err(DefinitionError::InvalidMonth {
                    field,
                    value: month,
                });
            }
        }
    }

    if StrftimeItems::new(&definition.date_format).any(|item| matches!(item, Item::Error)) {
        return Err(DefinitionError::InvalidDateFormat(
            definition.date_format.clone(),
        ));
    }

    Ok(())
}

fn require_days(frequency: &'static str, days: &[Weekday]) -> Result<(), DefinitionError> {
    if days.is_empty() {
        return Err(DefinitionError::EmptyCollectionDays { frequency });
    }
    Ok(())
}

fn require_period(frequency: &'static str, period: u32) -> Result<(), DefinitionError> {
    if period == 0 {
        return Err(DefinitionError::InvalidPeriod { frequency, period });
    }
    Ok(())
}
