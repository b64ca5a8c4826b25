// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mileage sync tests: every bike of an account is updated, or none is.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use common::{body_json, spawn_app, METERS_100_MI, METERS_200_MI, METERS_300_MI};
use wax_tracker::services::SyncOutcome;

#[tokio::test]
async fn test_sync_updates_every_bike() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    let account = app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;

    app.strava.add_gear("b1", "Road", METERS_100_MI);
    app.strava.add_gear("b2", "Gravel", METERS_200_MI);
    app.add_local_bike(bob.id, "b1", 10.0).await;
    app.add_local_bike(bob.id, "b2", 20.0).await;

    let outcome = app.state.strava.sync_mileage(&account).await;

    assert_eq!(outcome, SyncOutcome::Updated(2));
    assert_eq!(app.current_mileage("b1").await, 100.0);
    assert_eq!(app.current_mileage("b2").await, 200.0);
}

#[tokio::test]
async fn test_sync_is_all_or_nothing() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    let account = app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;

    // b2 is unknown to Strava, so its lookup fails after b1 was written
    app.strava.add_gear("b1", "Road", METERS_100_MI);
    app.add_local_bike(bob.id, "b1", 10.0).await;
    app.add_local_bike(bob.id, "b2", 20.0).await;

    let outcome = app.state.strava.sync_mileage(&account).await;

    assert_eq!(outcome, SyncOutcome::Failed);
    assert_eq!(app.current_mileage("b1").await, 10.0);
    assert_eq!(app.current_mileage("b2").await, 20.0);
}

#[tokio::test]
async fn test_bike_writes_proceed_during_sync() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    let account = app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;

    app.strava.add_gear("b1", "Road", METERS_100_MI);
    app.strava.add_gear("b2", "Gravel", METERS_200_MI);
    app.add_local_bike(bob.id, "b1", 10.0).await;
    app.add_local_bike(bob.id, "b2", 20.0).await;
    app.strava.set_gear_delay_ms(300);

    let state = app.state.clone();
    let sync = tokio::spawn(async move { state.strava.sync_mileage(&account).await });

    // Wait until the sync is blocked on Strava
    while app.strava.gear_requests() == 0 {
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }

    let waxed =
        tokio::time::timeout(StdDuration::from_millis(200), app.state.db.wax_bike("b1")).await;
    assert!(matches!(waxed, Ok(Ok(()))), "wax blocked by sync: {:?}", waxed);
    assert!(!sync.is_finished());

    assert_eq!(sync.await.unwrap(), SyncOutcome::Updated(2));
    assert_eq!(app.current_mileage("b1").await, 100.0);
    assert_eq!(app.current_mileage("b2").await, 200.0);
}

#[tokio::test]
async fn test_sync_skips_unlinked_account() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    app.add_local_bike(bob.id, "b1", 10.0).await;

    let outcome = app.state.strava.sync_mileage(&bob).await;

    assert_eq!(outcome, SyncOutcome::Skipped);
    assert_eq!(app.current_mileage("b1").await, 10.0);
}

#[tokio::test]
async fn test_sync_leaves_other_accounts_alone() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    let joe = app.create_account("joe").await;
    let account = app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;

    app.strava.add_gear("b1", "Road", METERS_100_MI);
    app.strava.add_gear("j1", "Joe's", METERS_300_MI);
    app.add_local_bike(bob.id, "b1", 0.0).await;
    app.add_local_bike(joe.id, "j1", 5.0).await;

    assert_eq!(
        app.state.strava.sync_mileage(&account).await,
        SyncOutcome::Updated(1)
    );
    assert_eq!(app.current_mileage("j1").await, 5.0);
}

#[tokio::test]
async fn test_user_page_survives_failed_sync() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;
    app.add_local_bike(bob.id, "gone", 42.0).await;
    let token = app.session_token(bob.id);

    let response = app.get("/user/bob", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["bikes"][0]["id"], "gone");
    assert_eq!(body["bikes"][0]["current_mileage"], 42.0);
}

#[tokio::test]
async fn test_user_page_reports_wax_status() {
    let app = spawn_app().await;
    let bob = app.create_account("bob").await;
    app.link_account(bob.id, Utc::now() + Duration::hours(1)).await;
    app.strava.add_gear("b1", "Road", METERS_300_MI);
    app.add_local_bike(bob.id, "b1", 0.0).await;
    app.state.db.set_starting_mileage("b1", 0.0).await.unwrap();
    let token = app.session_token(bob.id);

    let response = app.get("/user/bob", Some(&token)).await;
    let body = body_json(response).await;
    let bike = &body["bikes"][0];

    assert_eq!(bike["current_mileage"], 300.0);
    assert_eq!(bike["miles_since_wax"], 300.0);
    assert_eq!(bike["miles_remaining"], 0.0);
    assert_eq!(bike["needs_wax"], true);
}
