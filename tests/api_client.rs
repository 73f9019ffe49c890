use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

use rental_desk::config::ApiConfig;
use rental_desk::db::DatabasePool;
use rental_desk::error::ApiError;
use rental_desk::models::{ItemCategory, ItemStatus, LoginRequest};
use rental_desk::services::{
    FormField, HttpReservationApi, ReservationApi, ReservationCache, ReservationForm,
    SessionStore, SubmitOutcome,
};

const TOKEN: &str = "tok-1";

#[derive(Debug, Clone)]
struct Seen {
    method: &'static str,
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Stub {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    fn record(&self, method: &'static str, path: String, headers: &HeaderMap, body: Value) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(Seen {
            method,
            path,
            authorization,
            body,
        });
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {}", TOKEN))
}

fn unauthenticated() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Unauthenticated."})),
    )
}

fn reservation_json(id: i64, body: &Value) -> Value {
    let items = |key: &str, code_key: &str| -> Value {
        body[key]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| json!({"code": e[code_key], "name": "item"}))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into()
    };
    json!({
        "id": id,
        "reservation_code": body["reservation_code"],
        "pickupPlan_code": body["pickupPlan_code"],
        "returnPlan_code": body.get("returnPlan_code").cloned().unwrap_or(Value::Null),
        "information": body.get("information").cloned().unwrap_or(Value::Null),
        "status": body["status"],
        "motor_items": items("motor", "motor_code"),
        "helmet_items": items("helmet", "helmet_code"),
        "fak_items": items("fak", "fak_code"),
        "hardcase_items": null,
        "created_at": "2024-03-01T09:00:00Z",
        "updated_at": "2024-03-01T09:00:00Z"
    })
}

async fn login(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.record("POST", "/auth".to_string(), &headers, body.clone());
    if body["password"] != "secret" {
        return unauthenticated();
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "Login successful",
            "data": {
                "user": {"id": 1, "username": body["username"]},
                "token": TOKEN,
                "privilege": "admin"
            }
        })),
    )
}

async fn logout(State(stub): State<Stub>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    stub.record("POST", "/logout".to_string(), &headers, Value::Null);
    (StatusCode::OK, Json(json!({"message": "Logged out"})))
}

async fn plans(State(stub): State<Stub>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    stub.record("GET", "/plans".to_string(), &headers, Value::Null);
    (
        StatusCode::OK,
        Json(json!({
            "message": "ok",
            "data": [{"id": 1, "plan_code": "PLN1", "name": "Main garage", "address": "Jl. Merdeka 1"}]
        })),
    )
}

async fn list_reservations(
    State(stub): State<Stub>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    stub.record("GET", "/reservations".to_string(), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthenticated();
    }
    (StatusCode::OK, Json(json!({"message": "ok", "data": []})))
}

async fn show_reservation(
    State(stub): State<Stub>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let relations = query.get("relations").cloned().unwrap_or_default();
    stub.record(
        "GET",
        format!("/reservations/{}?relations={}", id, relations),
        &headers,
        Value::Null,
    );
    let body = json!({
        "reservation_code": "R7",
        "pickupPlan_code": "PLN1",
        "status": "In Rental",
        "motor": [{"motor_code": "MTR1"}],
        "helmet": [{"helmet_code": "HLM1"}],
        "fak": [{"fak_code": "FAK1"}]
    });
    (
        StatusCode::OK,
        Json(json!({"message": "ok", "data": reservation_json(id, &body)})),
    )
}

async fn create_reservation(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.record("POST", "/reservations".to_string(), &headers, body.clone());
    if !authorized(&headers) {
        return unauthenticated();
    }
    if body["reservation_code"] == "R400" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "The given data was invalid.",
                "error": {
                    "motor.0.motor_code": ["The selected motor.0.motor_code is invalid."],
                    "deposit": ["The deposit field is required."]
                }
            })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"message": "created", "data": reservation_json(100, &body)})),
    )
}

async fn update_reservation(
    State(stub): State<Stub>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.record("PUT", format!("/reservations/{}", id), &headers, body.clone());
    if !authorized(&headers) {
        return unauthenticated();
    }
    (
        StatusCode::OK,
        Json(json!({"message": "updated", "data": reservation_json(id, &body)})),
    )
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/api/auth", post(login))
        .route("/api/logout", post(logout))
        .route("/api/plans", get(plans))
        .route(
            "/api/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route(
            "/api/reservations/:id",
            get(show_reservation).put(update_reservation),
        )
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/", addr)
}

struct Harness {
    stub: Stub,
    db: DatabasePool,
    session: Arc<SessionStore>,
    api: Arc<HttpReservationApi>,
}

async fn harness() -> Harness {
    let stub = Stub::default();
    let base_url = spawn_stub(stub.clone()).await;

    let db = DatabasePool::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    let session = Arc::new(SessionStore::load(db.clone()).await.unwrap());

    let config = ApiConfig {
        base_url,
        timeout_secs: 5,
    };
    let api = Arc::new(HttpReservationApi::new(&config, session.clone()).unwrap());
    Harness {
        stub,
        db,
        session,
        api,
    }
}

async fn signed_in() -> Harness {
    let harness = harness().await;
    let request = LoginRequest {
        username: "desk".to_string(),
        password: "secret".to_string(),
    };
    assert_ok!(harness.api.login(&request).await);
    harness
}

#[tokio::test]
async fn pickup_is_posted_with_bearer_token() {
    let h = signed_in().await;
    assert_eq!(h.session.access_token().await.as_deref(), Some(TOKEN));
    assert_eq!(h.session.user().await.map(|u| u.username).as_deref(), Some("desk"));

    let plans = assert_ok!(h.api.list_plans().await);
    assert_eq!(plans[0].plan_code, "PLN1");

    let mut form = ReservationForm::pickup(h.api.clone());
    form.set_reservation_code("R100");
    form.set_pickup_plan_code("PLN1");
    form.add_item(ItemCategory::Motor, "MTR1");

    let SubmitOutcome::Saved { reservation, .. } = form.submit().await else {
        panic!("pickup was not saved");
    };
    assert_eq!(reservation.id, 100);

    let post = h
        .stub
        .seen()
        .into_iter()
        .find(|s| s.method == "POST" && s.path == "/reservations")
        .unwrap();
    assert_eq!(post.authorization.as_deref(), Some("Bearer tok-1"));
    assert_eq!(
        post.body,
        json!({
            "reservation_code": "R100",
            "pickupPlan_code": "PLN1",
            "motor": [{"motor_code": "MTR1"}],
            "helmet": [],
            "fak": [],
            "status": "In Rental"
        })
    );
}

#[tokio::test]
async fn return_is_hydrated_with_relations_and_put_with_statuses() {
    let h = signed_in().await;

    let mut form = ReservationForm::open(h.api.clone(), 7).await.unwrap();
    let get = h
        .stub
        .seen()
        .into_iter()
        .find(|s| s.method == "GET" && s.path.starts_with("/reservations/7"))
        .unwrap();
    assert_eq!(
        get.path,
        "/reservations/7?relations=helmetItems,fakItems,motorItems,hardcaseItems,return,pickup,motoritems.general"
    );

    form.set_return_plan_code("PLN2").unwrap();
    form.set_item_status(ItemCategory::Fak, "FAK1", ItemStatus::Incomplete)
        .unwrap();
    let outcome = form.submit().await;
    assert!(matches!(outcome, SubmitOutcome::Saved { .. }), "{:?}", outcome);

    let put = h
        .stub
        .seen()
        .into_iter()
        .find(|s| s.method == "PUT")
        .unwrap();
    assert_eq!(put.path, "/reservations/7");
    assert_eq!(
        put.body,
        json!({
            "reservation_code": "R7",
            "pickupPlan_code": "PLN1",
            "returnPlan_code": "PLN2",
            "motor": [{"motor_code": "MTR1", "status": "Ready For Rent"}],
            "helmet": [{"helmet_code": "HLM1", "status": "Ready For Rent"}],
            "fak": [{"fak_code": "FAK1", "status": "Incomplete"}],
            "status": "Finished Rental"
        })
    );
}

#[tokio::test]
async fn validation_errors_land_on_form_fields() {
    let h = signed_in().await;
    let cache = Arc::new(ReservationCache::new());
    assert_ok!(cache.reservations(h.api.as_ref()).await);

    let mut form = ReservationForm::pickup(h.api.clone()).with_cache(cache.clone());
    form.set_reservation_code("R400");
    form.set_pickup_plan_code("PLN1");
    form.add_item(ItemCategory::Motor, "MTR404");

    let SubmitOutcome::Rejected(errors) = form.submit().await else {
        panic!("expected the API to reject the pickup");
    };
    assert_eq!(
        errors.field(FormField::Items(ItemCategory::Motor)),
        ["The selected motor.0.motor_code is invalid."]
    );
    assert_eq!(
        errors.custom()["deposit"],
        vec!["The deposit field is required."]
    );
    assert!(form.collections().get(ItemCategory::Motor).contains("MTR404"));
    // nothing was saved, so the list is still current
    assert!(cache.is_fresh().await);
}

#[tokio::test]
async fn unauthorized_response_clears_persisted_token() {
    let h = harness().await;
    assert_ok!(h.session.sign_in("expired".to_string(), None).await);

    let err = assert_err!(h.api.list_reservations().await);
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!h.session.is_authenticated().await);

    let reopened = SessionStore::load(h.db.clone()).await.unwrap();
    assert_eq!(reopened.access_token().await, None);

    let mut form = ReservationForm::pickup(h.api.clone());
    form.set_reservation_code("R101");
    form.set_pickup_plan_code("PLN1");
    assert_eq!(form.submit().await, SubmitOutcome::SessionExpired);
}

#[tokio::test]
async fn logout_forgets_credentials() {
    let h = signed_in().await;
    let message = assert_ok!(h.api.logout().await);
    assert_eq!(message.as_deref(), Some("Logged out"));
    assert!(!h.session.is_authenticated().await);
    assert_eq!(h.session.user().await, None);

    let logout = h
        .stub
        .seen()
        .into_iter()
        .find(|s| s.path == "/logout")
        .unwrap();
    assert_eq!(logout.authorization.as_deref(), Some("Bearer tok-1"));
}
