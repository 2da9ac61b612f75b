use chrono::{NaiveDate, Weekday};
use garbage_collection::{
    Aggregator, ScheduleDefinition, ScheduleEngine, load_dates_from_csv, save_events_to_csv,
};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn events_export_to_csv() {
    let mut aggregator = Aggregator::new();
    aggregator.add_engine(
        ScheduleEngine::new("sensor.paper", ScheduleDefinition::weekly("Paper", vec![Weekday::Fri]))
            .unwrap(),
    );
    aggregator.add_engine(
        ScheduleEngine::new(
            "sensor.bulky",
            ScheduleDefinition::blank("Bulky, large").with_include_dates([d(2020, 4, 2)]),
        )
        .unwrap(),
    );
    aggregator.refresh_all(d(2020, 4, 1).and_hms_opt(8, 0, 0).unwrap());

    let file = NamedTempFile::new().expect("create temp file");
    let events = aggregator.list_events(d(2020, 4, 1), d(2020, 4, 30));
    save_events_to_csv(&events, file.path()).unwrap();
    let text = fs::read_to_string(file.path()).unwrap();
    assert_eq!(
        text,
        "id,title,date\nsensor.bulky,\"Bulky, large\",2020-04-02\nsensor.paper,Paper,2020-04-03\n"
    );
}

#[test]
fn imported_dates_become_exclusions() {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(b"date\n2020-04-03\n2020-04-10\n").unwrap();
    let dates = load_dates_from_csv(file.path()).unwrap();
    assert_eq!(dates, vec![d(2020, 4, 3), d(2020, 4, 10)]);

    let mut engine =
        ScheduleEngine::new("sensor.paper", ScheduleDefinition::weekly("", vec![Weekday::Fri])).unwrap();
    engine
        .exclude_dates(dates, d(2020, 4, 1).and_hms_opt(8, 0, 0).unwrap())
        .unwrap();
    assert_eq!(engine.next_date(), Some(d(2020, 4, 17)));
}
