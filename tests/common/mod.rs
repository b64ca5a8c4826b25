// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test harness: in-memory database plus a local stand-in for the
//! Strava API.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wax_tracker::config::Config;
use wax_tracker::db::Database;
use wax_tracker::middleware::auth::{create_jwt, SESSION_TTL};
use wax_tracker::models::account::StravaCredentials;
use wax_tracker::models::Account;
use wax_tracker::routes::create_router;
use wax_tracker::services::password::hash_password;
use wax_tracker::AppState;

pub const ATHLETE_ID: i64 = 424242;

/// 100, 200 and 300 miles in meters.
pub const METERS_100_MI: f64 = 160_934.4;
pub const METERS_200_MI: f64 = 321_868.8;
pub const METERS_300_MI: f64 = 482_803.2;

/// Mutable state behind the fake Strava server.
#[derive(Default)]
pub struct FakeStrava {
    /// gear id -> (name, distance in meters)
    pub gear: Mutex<HashMap<String, (String, f64)>>,
    /// Gear ids listed on the athlete profile
    pub athlete_bikes: Mutex<Vec<String>>,
    pub refresh_calls: AtomicUsize,
    pub code_exchanges: AtomicUsize,
    pub deauthorize_calls: AtomicUsize,
    pub gear_requests: AtomicUsize,
    /// Delay before each gear response, in milliseconds
    pub gear_delay_ms: AtomicU64,
}

impl FakeStrava {
    pub fn add_gear(&self, id: &str, name: &str, meters: f64) {
        self.gear
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), meters));
    }

    /// Add gear and list it on the athlete profile.
    pub fn add_bike(&self, id: &str, name: &str, meters: f64) {
        self.add_gear(id, name, meters);
        self.athlete_bikes.lock().unwrap().push(id.to_string());
    }

    pub fn set_distance(&self, id: &str, meters: f64) {
        if let Some(entry) = self.gear.lock().unwrap().get_mut(id) {
            entry.1 = meters;
        }
    }

    pub fn set_gear_delay_ms(&self, ms: u64) {
        self.gear_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn gear_requests(&self) -> usize {
        self.gear_requests.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

async fn fake_token(
    State(fake): State<Arc<FakeStrava>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expires_at = (Utc::now() + Duration::hours(6)).timestamp();

    match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {
            let n = fake.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Json(json!({
                "token_type": "Bearer",
                "access_token": format!("refreshed_access_{}", n),
                "refresh_token": format!("refreshed_refresh_{}", n),
                "expires_at": expires_at,
                "expires_in": 21600
            }))
            .into_response()
        }
        Some("authorization_code") if form.get("code").map(String::as_str) != Some("bad") => {
            fake.code_exchanges.fetch_add(1, Ordering::SeqCst);
            Json(json!({
                "token_type": "Bearer",
                "access_token": "access_from_code",
                "refresh_token": "refresh_from_code",
                "expires_at": expires_at,
                "athlete": {"id": ATHLETE_ID, "firstname": "Test", "lastname": "Rider"}
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Bad Request"})),
        )
            .into_response(),
    }
}

async fn fake_deauthorize(State(fake): State<Arc<FakeStrava>>) -> Json<Value> {
    fake.deauthorize_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"access_token": "revoked"}))
}

async fn fake_athlete(State(fake): State<Arc<FakeStrava>>) -> Json<Value> {
    let gear = fake.gear.lock().unwrap();
    let bikes: Vec<Value> = fake
        .athlete_bikes
        .lock()
        .unwrap()
        .iter()
        .filter_map(|id| gear.get(id).map(|(name, meters)| (id, name, meters)))
        .map(|(id, name, meters)| {
            json!({"id": id, "primary": false, "name": name, "resource_state": 2, "distance": meters})
        })
        .collect();

    Json(json!({"id": ATHLETE_ID, "firstname": "Test", "lastname": "Rider", "bikes": bikes}))
}

async fn fake_gear(State(fake): State<Arc<FakeStrava>>, Path(id): Path<String>) -> Response {
    fake.gear_requests.fetch_add(1, Ordering::SeqCst);
    let delay = fake.gear_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
    let found = fake.gear.lock().unwrap().get(&id).cloned();
    match found {
        Some((name, meters)) => Json(json!({
            "id": id,
            "primary": false,
            "name": name,
            "resource_state": 3,
            "distance": meters
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Record Not Found"})),
        )
            .into_response(),
    }
}

async fn fake_push_subscription() -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({"id": 999})))
}

/// Start the fake Strava server and return its base URL.
async fn spawn_fake_strava(fake: Arc<FakeStrava>) -> String {
    let app = Router::new()
        .route("/oauth/token", post(fake_token))
        .route("/oauth/deauthorize", post(fake_deauthorize))
        .route("/api/v3/athlete", get(fake_athlete))
        .route("/api/v3/gear/{id}", get(fake_gear))
        .route("/api/v3/push_subscriptions", post(fake_push_subscription))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// The service under test wired to the fake Strava server.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub strava: Arc<FakeStrava>,
}

pub async fn spawn_app() -> TestApp {
    let strava = Arc::new(FakeStrava::default());
    let base = spawn_fake_strava(strava.clone()).await;

    let mut config = Config::test_default();
    config.strava_api_url = format!("{}/api/v3", base);
    config.strava_oauth_url = format!("{}/oauth", base);

    let db = Database::connect(&config.database_url).await.unwrap();
    let state = Arc::new(AppState::new(config, db));

    TestApp {
        router: create_router(state.clone()),
        state,
        strava,
    }
}

impl TestApp {
    /// Register an account directly in the database (password `password`).
    pub async fn create_account(&self, username: &str) -> Account {
        let hash = hash_password("password", 4).unwrap();
        self.state
            .db
            .create_account(username, &format!("{}@example.com", username), &hash)
            .await
            .unwrap()
    }

    /// Link an account to the fake athlete with the given token expiry.
    pub async fn link_account(&self, account_id: i64, expires_at: DateTime<Utc>) -> Account {
        let credentials = StravaCredentials {
            access_token: "stored_access".to_string(),
            refresh_token: "stored_refresh".to_string(),
            expires_at,
        };
        self.state
            .db
            .link_strava(account_id, ATHLETE_ID, &credentials)
            .await
            .unwrap();
        self.account(account_id).await
    }

    pub async fn account(&self, account_id: i64) -> Account {
        self.state.db.get_account(account_id).await.unwrap().unwrap()
    }

    /// Add a bike locally at the given odometer reading.
    pub async fn add_local_bike(&self, account_id: i64, gear_id: &str, miles: f64) {
        self.state
            .db
            .upsert_bike(account_id, gear_id, gear_id, miles, 300.0)
            .await
            .unwrap();
    }

    pub async fn current_mileage(&self, gear_id: &str) -> f64 {
        self.state
            .db
            .get_bike(gear_id)
            .await
            .unwrap()
            .unwrap()
            .current_mileage
    }

    pub fn session_token(&self, account_id: i64) -> String {
        create_jwt(account_id, &self.state.config.secret_key, SESSION_TTL).unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(&self, uri: &str, body: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}
