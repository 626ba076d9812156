use crate::core::errors::ChiaTienError;
use crate::core::models::expense::{NewExpense, ParticipantShare};
use crate::core::models::group::GroupUpdate;
use crate::infrastructure::api::{
    AuthApi, ExpenseApi, GroupApi, ReceiptApi, RequestContext, http_client::HttpBackend,
};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const TOKEN: &str = "stub-token";

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn expense_json(amount: u64) -> Value {
    json!({
        "id": "e1",
        "amount": amount,
        "description": "Dinner",
        "date": "2026-03-01T12:00:00Z",
        "paidBy": { "id": "u1", "displayName": "Alice", "avatar": null },
        "participants": [
            { "userId": "u1", "amount": 50, "settled": true, "user": { "id": "u1", "displayName": "Alice" } },
            { "userId": "u2", "amount": 50, "settled": false, "user": { "id": "u2", "displayName": "Bob" } }
        ],
        "group": { "id": "g1", "name": "Trip", "emoji": "💰" }
    })
}

async fn list_groups(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })));
    }
    let groups = json!([{
        "id": "g1",
        "name": "Trip",
        "emoji": "💰",
        "description": null,
        "memberCount": 2,
        "expenseCount": 1,
        "balance": -5000,
        "members": [
            { "id": "u1", "displayName": "Alice", "avatar": null },
            { "id": "u2", "displayName": "Bob", "avatar": null, "balance": -5000 }
        ]
    }]);
    (StatusCode::OK, Json(groups))
}

async fn get_group(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Group {} not found", id) })),
    )
}

async fn update_group(Path(id): Path<String>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if id == "locked" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Group is being edited elsewhere" })),
        );
    }
    let group = json!({
        "id": id,
        "name": body["name"],
        "emoji": "🏕️",
        "description": null,
        "memberCount": 1,
        "expenseCount": 0,
        "balance": 0,
        "members": []
    });
    (StatusCode::OK, Json(group))
}

async fn delete_group(Path(id): Path<String>) -> (StatusCode, String) {
    match id.as_str() {
        "broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Database unavailable" }).to_string(),
        ),
        "silent" => (StatusCode::OK, String::new()),
        _ => (StatusCode::OK, json!({ "message": "Group deleted" }).to_string()),
    }
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid credentials" })));
    }
    let auth = json!({
        "token": TOKEN,
        "user": { "id": "u1", "username": body["username"], "displayName": "Alice", "avatar": null }
    });
    (StatusCode::OK, Json(auth))
}

async fn register() -> (StatusCode, Json<Value>) {
    (StatusCode::CONFLICT, Json(json!({ "error": "Username already exists" })))
}

async fn list_expenses(
    State(recorded): State<Recorded>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    recorded.queries.lock().await.push(query);
    Json(json!([expense_json(100)]))
}

async fn create_expense(State(recorded): State<Recorded>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let amount = body["amount"].as_u64().unwrap_or_default();
    recorded.bodies.lock().await.push(body);
    if amount == 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "Amount must be positive" })),
        );
    }
    (StatusCode::CREATED, Json(expense_json(amount)))
}

async fn settle_expense() -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({})))
}

async fn delete_expense() -> (StatusCode, Json<Value>) {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Only the payer can delete an expense" })),
    )
}

async fn parse_receipt() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "<html>upstream timed out</html>")
}

async fn spawn_stub() -> (String, Recorded) {
    let _ = env_logger::try_init();
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/groups", get(list_groups))
        .route("/api/groups/{id}", get(get_group).put(update_group).delete(delete_group))
        .route("/api/expenses", get(list_expenses).post(create_expense))
        .route("/api/expenses/{id}", patch(settle_expense).delete(delete_expense))
        .route("/api/receipts/parse", post(parse_receipt))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/", addr), recorded)
}

fn backend() -> HttpBackend {
    HttpBackend::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_login_returns_token_and_user() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url);

    let auth = backend().login(&ctx, "alice", "secret").await.unwrap();
    assert_eq!(auth.token, TOKEN);
    assert_eq!(auth.user.username, "alice");
    assert_eq!(auth.user.display_name, "Alice");

    let result = backend().login(&ctx, "alice", "wrong").await;
    assert!(matches!(result, Err(ChiaTienError::InvalidCredentials)));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let (base_url, _) = spawn_stub().await;
    let anonymous = RequestContext::anonymous(base_url);

    let result = backend().list_groups(&anonymous).await;
    assert!(matches!(result, Err(ChiaTienError::Unauthorized)));

    let groups = backend().list_groups(&anonymous.with_token(TOKEN)).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].member_count, 2);
    assert_eq!(groups[0].balance, -5000);
    assert_eq!(groups[0].members[0].balance, None);
    assert_eq!(groups[0].members[1].balance, Some(-5000));
}

#[tokio::test]
async fn test_error_statuses_map_to_variants() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    let result = api.get_group(&ctx, "g404").await;
    assert!(matches!(result, Err(ChiaTienError::NotFound(m)) if m == "Group g404 not found"));

    let result = api.register(&ctx, "alice", "secret", None).await;
    assert!(matches!(result, Err(ChiaTienError::UsernameTaken(name)) if name == "alice"));

    let result = api.delete_expense(&ctx, "e1").await;
    assert!(matches!(result, Err(ChiaTienError::Forbidden(_))));

    // no `error` field falls back to a generic message
    let result = api.settle_expense(&ctx, "e1", Some("u2")).await;
    assert!(matches!(result, Err(ChiaTienError::Validation(m)) if m == "Request failed"));
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);

    let result = backend().parse_receipt(&ctx, "data:image/jpeg;base64,AAAA").await;
    assert!(matches!(result, Err(ChiaTienError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_create_expense_sends_camel_case_body() {
    let (base_url, recorded) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let payload = NewExpense {
        group_id: "g1".to_string(),
        amount: 100,
        description: "Dinner".to_string(),
        date: None,
        paid_by_id: Some("u1".to_string()),
        participants: Some(vec![
            ParticipantShare {
                user_id: "u1".to_string(),
                amount: 50,
            },
            ParticipantShare {
                user_id: "u2".to_string(),
                amount: 50,
            },
        ]),
        receipt_id: None,
    };

    let expense = backend().create_expense(&ctx, &payload).await.unwrap();
    assert_eq!(expense.amount, 100);
    assert_eq!(expense.paid_by.display_name, "Alice");
    assert_eq!(expense.participants.len(), 2);
    assert_eq!(expense.group.map(|g| g.id).as_deref(), Some("g1"));

    let bodies = recorded.bodies.lock().await;
    let sent = &bodies[0];
    assert_eq!(sent["groupId"], "g1");
    assert_eq!(sent["paidById"], "u1");
    assert_eq!(sent["participants"][1]["userId"], "u2");
    assert!(sent.get("receiptId").is_none());
    assert!(sent.get("date").is_none());
}

#[tokio::test]
async fn test_validation_error_on_create() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let payload = NewExpense {
        group_id: "g1".to_string(),
        amount: 0,
        description: "Nothing".to_string(),
        date: None,
        paid_by_id: None,
        participants: None,
        receipt_id: None,
    };
    let result = backend().create_expense(&ctx, &payload).await;
    assert!(matches!(result, Err(ChiaTienError::Validation(m)) if m == "Amount must be positive"));
}

#[tokio::test]
async fn test_list_expenses_filters_by_group() {
    let (base_url, recorded) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    let expenses = api.list_expenses(&ctx, Some("g1")).await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].date.to_rfc3339(), "2026-03-01T12:00:00+00:00");
    api.list_expenses(&ctx, None).await.unwrap();

    let queries = recorded.queries.lock().await;
    assert_eq!(queries[0].get("groupId").map(String::as_str), Some("g1"));
    assert!(queries[1].is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let _ = env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ctx = RequestContext::anonymous(format!("http://{}", addr));
    let result = backend().list_groups(&ctx).await;
    assert!(matches!(result, Err(ChiaTienError::TransportError(_))));
}

#[tokio::test]
async fn test_update_and_delete_group() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    let update = GroupUpdate {
        name: Some("Camping".to_string()),
        ..GroupUpdate::default()
    };
    let group = api.update_group(&ctx, "g1", &update).await.unwrap();
    assert_eq!(group.id, "g1");
    assert_eq!(group.name, "Camping");

    let response = api.delete_group(&ctx, "g1").await.unwrap();
    assert_eq!(response.message, "Group deleted");
}

#[tokio::test]
async fn test_conflict_server_error_and_empty_body() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    let result = api.update_group(&ctx, "locked", &GroupUpdate::default()).await;
    assert!(matches!(result, Err(ChiaTienError::Conflict(m)) if m == "Group is being edited elsewhere"));

    let result = api.delete_group(&ctx, "broken").await;
    assert!(matches!(result, Err(ChiaTienError::ServerError(m)) if m == "Database unavailable"));

    // a success status does not excuse a missing body
    let result = api.delete_group(&ctx, "silent").await;
    assert!(matches!(result, Err(ChiaTienError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_ids_are_percent_encoded() {
    let (base_url, recorded) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    let result = api.get_group(&ctx, "a/b#c&d?").await;
    assert!(matches!(result, Err(ChiaTienError::NotFound(m)) if m == "Group a/b#c&d? not found"));

    let result = api.get_group(&ctx, "../expenses").await;
    assert!(matches!(result, Err(ChiaTienError::NotFound(m)) if m == "Group ../expenses not found"));

    api.list_expenses(&ctx, Some("g1&groupId=g2&admin=1")).await.unwrap();
    let queries = recorded.queries.lock().await;
    assert_eq!(queries[0].len(), 1);
    assert_eq!(
        queries[0].get("groupId").map(String::as_str),
        Some("g1&groupId=g2&admin=1")
    );
}

#[tokio::test]
async fn test_dot_segments_are_rejected() {
    let (base_url, _) = spawn_stub().await;
    let ctx = RequestContext::anonymous(base_url).with_token(TOKEN);
    let api = backend();

    for id in ["..", ".", ""] {
        let result = api.get_group(&ctx, id).await;
        assert!(matches!(result, Err(ChiaTienError::InvalidInput(field, _)) if field == "id"));
    }
    let result = api.delete_expense(&ctx, "..").await;
    assert!(matches!(result, Err(ChiaTienError::InvalidInput(_, _))));
}
