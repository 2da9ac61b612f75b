use chrono::{NaiveDate, NaiveTime, Weekday};
use garbage_collection::{
    ConfigError, Frequency, GarbageCollectionConfig, HolidayCalendar, ScheduleDefinition,
    ScheduleEntry, WeekdayOrdinal, load_config_from_json, save_config_to_json,
};
use std::io::Write;
use tempfile::NamedTempFile;

const SAMPLE: &str = r#"{
    "throttle_seconds": 10,
    "schedules": [
        {
            "id": "sensor.glass",
            "name": "Glass",
            "frequency": "monthly",
            "collection_days": ["wed"],
            "weekday_order_number": ["1"],
            "expire_after": "10:00",
            "first_month": 3,
            "last_month": 11,
            "holidays": "us_federal",
            "exclude_dates": ["2020-04-01"]
        },
        {
            "id": "sensor.plastic",
            "frequency": "every-n-weeks",
            "period": 2,
            "first_week": 3,
            "collection_days": ["tue", "fri"],
            "verbose_state": true,
            "verbose_format": "{date}",
            "date_format": "%Y/%m/%d"
        }
    ]
}"#;

#[test]
fn load_config_reads_every_field() {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(SAMPLE.as_bytes()).unwrap();

    let config = load_config_from_json(file.path()).unwrap();
    assert_eq!(config.throttle_seconds, 10);
    let glass = &config.schedules[0];
    assert_eq!(glass.id, "sensor.glass");
    assert_eq!(glass.definition.expire_after, NaiveTime::from_hms_opt(10, 0, 0));
    assert_eq!(glass.definition.holidays, Some(HolidayCalendar::UsFederal));
    assert_eq!(glass.definition.exclude_dates, vec![NaiveDate::from_ymd_opt(2020, 4, 1).unwrap()]);
    assert_eq!(
        glass.definition.frequency,
        Frequency::Monthly {
            collection_days: vec![Weekday::Wed],
            weekday_order_number: vec![WeekdayOrdinal::Nth(1)],
            period: 1,
            offset: 0,
            force_week_order_numbers: false,
        }
    );
    let plastic = &config.schedules[1];
    assert!(plastic.definition.verbose_state);
    assert_eq!(plastic.definition.date_format, "%Y/%m/%d");
}

#[test]
fn save_then_load_round_trips() {
    let config = GarbageCollectionConfig {
        throttle_seconds: 45,
        schedules: vec![
            ScheduleEntry {
                id: "sensor.paper".to_string(),
                definition: ScheduleDefinition::weekly("Paper", vec![Weekday::Mon, Weekday::Thu])
                    .with_season(11, 2),
            },
            ScheduleEntry {
                id: "sensor.bulky".to_string(),
                definition: ScheduleDefinition::blank("Bulky")
                    .with_include_dates([NaiveDate::from_ymd_opt(2020, 5, 5).unwrap()]),
            },
        ],
    };
    let file = NamedTempFile::new().expect("create temp file");
    save_config_to_json(&config, file.path()).unwrap();
    let loaded = load_config_from_json(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config_from_json(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(br#"{"schedules": [{"id": "x", "frequency": "fortnightly"}]}"#)
        .unwrap();
    let err = load_config_from_json(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Serialization(_)));
}

#[test]
fn aggregator_round_trips_back_into_config() {
    let config: GarbageCollectionConfig = serde_json::from_str(SAMPLE).unwrap();
    let aggregator = config.build_aggregator().unwrap();
    assert_eq!(aggregator.ids(), vec!["sensor.glass", "sensor.plastic"]);
    let captured = GarbageCollectionConfig::from_aggregator(&aggregator, 10);
    assert_eq!(captured, config);
}
