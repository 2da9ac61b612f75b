#![cfg(feature = "http_api")]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use chrono::{NaiveDate, Weekday};
use garbage_collection::{
    Aggregator, CalendarEvent, EngineSnapshot, ScheduleDefinition, ScheduleEngine, http_api,
};
use serde_json::json;
use tower::util::ServiceExt;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn new_router() -> axum::Router {
    let mut aggregator = Aggregator::new();
    aggregator.add_engine(
        ScheduleEngine::new("sensor.paper", ScheduleDefinition::weekly("Paper", vec![Weekday::Wed]))
            .unwrap(),
    );
    aggregator.add_engine(ScheduleEngine::new("sensor.bulky", ScheduleDefinition::blank("Bulky")).unwrap());
    let now = d(2020, 4, 2).and_hms_opt(8, 0, 0).unwrap();
    aggregator.refresh_all(now);
    let state = http_api::AppState::new(aggregator).with_clock(Arc::new(move || now));
    http_api::router(state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_reports_ok() {
    let app = new_router();
    let (status, bytes) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn schedule_lifecycle_via_http_api() {
    let app = new_router();

    let (status, bytes) = send(&app, "GET", "/schedules", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<EngineSnapshot> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].next_date, Some(d(2020, 4, 8)));

    // Add a manual date to the blank schedule
    let (status, bytes) = send(
        &app,
        "POST",
        "/schedules/sensor.bulky/add_date",
        Some(json!({ "date": "2020-04-03" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: EngineSnapshot = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.next_date, Some(d(2020, 4, 3)));
    assert_eq!(snapshot.days, Some(1));

    let (status, bytes) = send(&app, "GET", "/calendar/next", None).await;
    assert_eq!(status, StatusCode::OK);
    let next: CalendarEvent = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(next.id, "sensor.bulky");

    // Remove it again
    let (status, bytes) = send(
        &app,
        "POST",
        "/schedules/sensor.bulky/remove_date",
        Some(json!({ "date": "2020-04-03" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: EngineSnapshot = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.next_date, None);

    // Delete the schedule
    let (status, _) = send(&app, "DELETE", "/schedules/sensor.bulky", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, bytes) = send(&app, "GET", "/schedules/sensor.bulky", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn calendar_window_filters_events() {
    let app = new_router();
    let (status, bytes) = send(&app, "GET", "/calendar?start=2020-04-01&end=2020-04-30", None).await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<CalendarEvent> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, d(2020, 4, 8));

    let (status, bytes) = send(&app, "GET", "/calendar?start=2020-04-09&end=2020-04-30", None).await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<CalendarEvent> = serde_json::from_slice(&bytes).unwrap();
    assert!(events.is_empty());

    let (status, _) = send(&app, "GET", "/calendar?start=2020-05-01&end=2020-04-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commands_for_unknown_schedules_are_not_found() {
    let app = new_router();
    let (status, _) = send(&app, "POST", "/schedules/sensor.nope/update_state", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", "/schedules/sensor.nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_state_recomputes_with_the_injected_clock() {
    let app = new_router();
    let (status, bytes) = send(&app, "POST", "/schedules/sensor.paper/update_state", None).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: EngineSnapshot = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.days, Some(6));
    assert_eq!(snapshot.last_updated, d(2020, 4, 2).and_hms_opt(8, 0, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn background_refresh_updates_schedules_off_the_async_workers() {
    let mut aggregator = Aggregator::new();
    aggregator.add_engine(
        ScheduleEngine::new("sensor.paper", ScheduleDefinition::weekly("Paper", vec![Weekday::Wed]))
            .unwrap(),
    );
    aggregator.add_engine(
        ScheduleEngine::new("sensor.blank", ScheduleDefinition::blank("Blank").with_manual_update())
            .unwrap(),
    );
    let now = d(2020, 4, 2).and_hms_opt(8, 0, 0).unwrap();
    let state = http_api::AppState::new(aggregator).with_clock(Arc::new(move || now));

    assert_eq!(http_api::refresh(&state).await, 0);
    let app = http_api::router(state);
    let (status, bytes) = send(&app, "GET", "/schedules", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<EngineSnapshot> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(listed[0].next_date, Some(d(2020, 4, 8)));
    assert_eq!(listed[0].last_updated, Some(now));
    assert_eq!(listed[1].last_updated, None);
}
