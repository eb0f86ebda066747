//! In-memory simulation of the Mailchimp v3 endpoints the client tests use.
//!
//! # Design
//! - Every request passes through `record_and_authenticate`, which buffers
//!   the body, appends a `RecordedRequest` to the log and then enforces
//!   Basic auth (any username, non-empty password).
//! - `MockState::respond_with` installs a canned response for a path; canned
//!   responses bypass routing, so tests can script non-JSON bodies, empty
//!   bodies, arbitrary statuses and delays.
//! - `run_hangup` serves a listener that reads each request and closes the
//!   socket without answering.
//! - Errors use Mailchimp's problem body shape.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{io::AsyncReadExt, net::TcpListener, sync::RwLock};
use uuid::Uuid;

const PROBLEM_TYPE: &str = "https://mailchimp.com/developer/marketing/docs/errors/";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct List {
    pub id: String,
    pub name: String,
    pub stats: ListStats,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ListStats {
    pub member_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: String,
    pub email_address: String,
    pub status: String,
    pub list_id: String,
}

#[derive(Deserialize)]
pub struct CreateList {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateList {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMember {
    pub email_address: String,
    pub status: String,
}

#[derive(Deserialize)]
pub struct UpdateMember {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpsertMember {
    pub email_address: String,
    pub status_if_new: String,
    pub status: Option<String>,
}

/// A request as it reached the server.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    /// Path and query exactly as sent on the request line.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The Basic auth `(username, password)` pair, if present.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        decode_basic(self.header("authorization")?)
    }
}

/// A scripted response for one path.
#[derive(Clone, Debug)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl CannedResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status: status_code(status),
            content_type: "application/json",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: status_code(status),
            content_type: "text/plain",
            body: body.into(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Default)]
pub struct Store {
    pub lists: HashMap<String, List>,
    /// list id -> subscriber hash -> member
    pub members: HashMap<String, HashMap<String, Member>>,
}

#[derive(Clone, Default)]
pub struct MockState {
    pub db: Arc<RwLock<Store>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    canned: Arc<RwLock<HashMap<String, CannedResponse>>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for every request whose path (without query) is
    /// `path`, whatever the method.
    pub async fn respond_with(&self, path: &str, response: CannedResponse) {
        self.canned.write().await.insert(path.to_string(), response);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.read().await.last().cloned()
    }
}

pub fn app() -> Router {
    app_with_state(MockState::new())
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/3.0", get(account_root))
        .route("/3.0/", get(account_root))
        .route("/3.0/ping", get(ping))
        .route("/3.0/lists", get(list_lists).post(create_list))
        .route(
            "/3.0/lists/{list_id}",
            get(get_list).patch(update_list).delete(delete_list),
        )
        .route(
            "/3.0/lists/{list_id}/members",
            get(list_members).post(create_member),
        )
        .route(
            "/3.0/lists/{list_id}/members/{subscriber_hash}",
            get(get_member)
                .patch(update_member)
                .put(upsert_member)
                .delete(delete_member),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            record_and_authenticate,
        ))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Accept connections, read whatever the client sends first, then close
/// the socket without writing a response.
pub async fn run_hangup(listener: TcpListener) -> Result<(), std::io::Error> {
    loop {
        let (mut socket, _) = listener.accept().await?;
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        });
    }
}

/// Lowercase MD5 hex of the lowercased email, as Mailchimp computes it.
pub fn subscriber_hash(email: &str) -> String {
    hex::encode(Md5::digest(email.trim().to_lowercase().as_bytes()))
}

pub fn problem(status: StatusCode, title: &str, detail: impl Into<String>) -> Response {
    let body = json!({
        "type": PROBLEM_TYPE,
        "title": title,
        "status": status.as_u16(),
        "detail": detail.into(),
        "instance": Uuid::new_v4().to_string(),
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        body.to_string(),
    )
        .into_response()
}

fn decode_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

async fn record_and_authenticate(
    State(state): State<MockState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return problem(StatusCode::BAD_REQUEST, "Invalid Resource", e.to_string()),
    };

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let recorded = RecordedRequest {
        method: parts.method.as_str().to_string(),
        path,
        headers: header_pairs(&parts.headers),
        body: bytes.to_vec(),
    };
    tracing::debug!(method = %recorded.method, path = %recorded.path, "request");
    state.requests.write().await.push(recorded.clone());

    let password = recorded.basic_auth().map(|(_, password)| password);
    if password.as_deref().is_none_or(str::is_empty) {
        return problem(
            StatusCode::UNAUTHORIZED,
            "API Key Missing",
            "Your request did not include an API key.",
        );
    }

    let canned = state.canned.read().await.get(parts.uri.path()).cloned();
    if let Some(canned) = canned {
        if let Some(delay) = canned.delay {
            tokio::time::sleep(delay).await;
        }
        return (
            canned.status,
            [(header::CONTENT_TYPE, canned.content_type)],
            canned.body,
        )
            .into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn invalid_resource(rejection: JsonRejection) -> Response {
    problem(
        StatusCode::BAD_REQUEST,
        "Invalid Resource",
        rejection.body_text(),
    )
}

fn list_not_found() -> Response {
    problem(
        StatusCode::NOT_FOUND,
        "Resource Not Found",
        "The requested resource could not be found.",
    )
}

async fn not_found() -> Response {
    list_not_found()
}

async fn account_root() -> Json<serde_json::Value> {
    Json(json!({
        "account_id": "8d3a3db4d97663a9074efcc16",
        "account_name": "Mock Account",
        "login_id": "mock",
    }))
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "health_status": "Everything's Chimpy!" }))
}

async fn list_lists(State(state): State<MockState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    let mut lists: Vec<&List> = db.lists.values().collect();
    lists.sort_by(|a, b| a.name.cmp(&b.name));
    Json(json!({ "lists": lists, "total_items": lists.len() }))
}

async fn create_list(
    State(state): State<MockState>,
    input: Result<Json<CreateList>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_resource(rejection),
    };
    let list = List {
        id: Uuid::new_v4().simple().to_string()[..10].to_string(),
        name: input.name,
        stats: ListStats::default(),
    };
    let mut db = state.db.write().await;
    db.lists.insert(list.id.clone(), list.clone());
    db.members.insert(list.id.clone(), HashMap::new());
    Json(list).into_response()
}

async fn get_list(State(state): State<MockState>, Path(list_id): Path<String>) -> Response {
    match state.db.read().await.lists.get(&list_id) {
        Some(list) => Json(list.clone()).into_response(),
        None => list_not_found(),
    }
}

async fn update_list(
    State(state): State<MockState>,
    Path(list_id): Path<String>,
    input: Result<Json<UpdateList>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_resource(rejection),
    };
    let mut db = state.db.write().await;
    let Some(list) = db.lists.get_mut(&list_id) else {
        return list_not_found();
    };
    if let Some(name) = input.name {
        list.name = name;
    }
    Json(list.clone()).into_response()
}

async fn delete_list(State(state): State<MockState>, Path(list_id): Path<String>) -> Response {
    let mut db = state.db.write().await;
    if db.lists.remove(&list_id).is_none() {
        return list_not_found();
    }
    db.members.remove(&list_id);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_members(State(state): State<MockState>, Path(list_id): Path<String>) -> Response {
    let db = state.db.read().await;
    let Some(members) = db.members.get(&list_id) else {
        return list_not_found();
    };
    let mut members: Vec<&Member> = members.values().collect();
    members.sort_by(|a, b| a.email_address.cmp(&b.email_address));
    Json(json!({
        "members": members,
        "list_id": list_id,
        "total_items": members.len(),
    }))
    .into_response()
}

fn insert_member(db: &mut Store, list_id: &str, member: Member) {
    let hash = member.id.clone();
    let inserted = db
        .members
        .entry(list_id.to_string())
        .or_default()
        .insert(hash, member)
        .is_none();
    if inserted {
        if let Some(list) = db.lists.get_mut(list_id) {
            list.stats.member_count += 1;
        }
    }
}

async fn create_member(
    State(state): State<MockState>,
    Path(list_id): Path<String>,
    input: Result<Json<CreateMember>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_resource(rejection),
    };
    let mut db = state.db.write().await;
    if !db.lists.contains_key(&list_id) {
        return list_not_found();
    }
    let hash = subscriber_hash(&input.email_address);
    if db.members.get(&list_id).is_some_and(|m| m.contains_key(&hash)) {
        return problem(
            StatusCode::BAD_REQUEST,
            "Member Exists",
            format!("{} is already a list member.", input.email_address),
        );
    }
    let member = Member {
        id: hash,
        email_address: input.email_address,
        status: input.status,
        list_id: list_id.clone(),
    };
    insert_member(&mut db, &list_id, member.clone());
    Json(member).into_response()
}

async fn get_member(
    State(state): State<MockState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Response {
    let db = state.db.read().await;
    match db.members.get(&list_id).and_then(|m| m.get(&hash)) {
        Some(member) => Json(member.clone()).into_response(),
        None => list_not_found(),
    }
}

async fn update_member(
    State(state): State<MockState>,
    Path((list_id, hash)): Path<(String, String)>,
    input: Result<Json<UpdateMember>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_resource(rejection),
    };
    let mut db = state.db.write().await;
    let Some(member) = db.members.get_mut(&list_id).and_then(|m| m.get_mut(&hash)) else {
        return list_not_found();
    };
    if let Some(status) = input.status {
        member.status = status;
    }
    Json(member.clone()).into_response()
}

/// Add-or-update. Requires a body, which is what makes it a useful probe
/// for whether a client sends PUT payloads.
async fn upsert_member(
    State(state): State<MockState>,
    Path((list_id, hash)): Path<(String, String)>,
    input: Result<Json<UpsertMember>, JsonRejection>,
) -> Response {
    let Json(input) = match input {
        Ok(input) => input,
        Err(rejection) => return invalid_resource(rejection),
    };
    let mut db = state.db.write().await;
    if !db.lists.contains_key(&list_id) {
        return list_not_found();
    }
    if subscriber_hash(&input.email_address) != hash {
        return problem(
            StatusCode::BAD_REQUEST,
            "Invalid Resource",
            "The subscriber hash does not match the email address.",
        );
    }
    let existing = db.members.get(&list_id).and_then(|m| m.get(&hash)).cloned();
    let member = match existing {
        Some(mut member) => {
            if let Some(status) = input.status {
                member.status = status;
            }
            member
        }
        None => Member {
            id: hash,
            email_address: input.email_address,
            status: input.status_if_new,
            list_id: list_id.clone(),
        },
    };
    insert_member(&mut db, &list_id, member.clone());
    Json(member).into_response()
}

async fn delete_member(
    State(state): State<MockState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Response {
    let mut db = state.db.write().await;
    let removed = db
        .members
        .get_mut(&list_id)
        .and_then(|m| m.remove(&hash))
        .is_some();
    if !removed {
        return list_not_found();
    }
    if let Some(list) = db.lists.get_mut(&list_id) {
        list.stats.member_count = list.stats.member_count.saturating_sub(1);
    }
    StatusCode::NO_CONTENT.into_response()
}
