use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::db::{Database, DbError, Item, NewItem, TimeRange, Upserted, APP_VERSION, SCHEMA_VERSION};

const DEFAULT_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/ping", get(ping))
        .route("/version", get(version))
        .route("/Item", get(list_items).post(insert_item))
        .route("/Item/count", get(item_count))
        .route("/Item/search", get(search_items))
        .route(
            "/Item/:time",
            get(take_item).put(upsert_item).delete(delete_item),
        );

    Router::new().nest("/api/v2", api).with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
    error: Option<String>,
}

impl ApiError {
    fn bad_request(message: &'static str, err: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
            error: Some(err.to_string()),
        }
    }

    fn storage(message: &'static str, err: DbError) -> Self {
        let (status, message) = match err {
            DbError::NotFound => (StatusCode::NOT_FOUND, "Item not found"),
            DbError::ConstraintViolation(_) => (StatusCode::CONFLICT, message),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        Self {
            status,
            message,
            error: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(status = %self.status, error = ?self.error, "{}", self.message);
        let mut body = json!({ "message": self.message });
        if let Some(error) = self.error {
            body["error"] = Value::String(error);
        }
        reply(self.status, body)
    }
}

/// Runs a storage call on the blocking pool.
async fn with_db<T, F>(state: &AppState, message: &'static str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|err| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            error: Some(err.to_string()),
        })?
        .map_err(|err| ApiError::storage(message, err))
}

fn reply(status: StatusCode, mut body: Value) -> Response {
    body["status"] = json!(status.as_u16());
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemBody {
    time: i64,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DataBody {
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonItem {
    time: i64,
    data: String,
}

impl From<&Item> for JsonItem {
    fn from(item: &Item) -> Self {
        Self {
            time: item.time,
            data: STANDARD.encode(&item.data),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    start_time: Option<String>,
    end_time: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    search: Option<String>,
    limit: Option<String>,
}

fn parse_time(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|err| ApiError::bad_request("Invalid ItemTime", err))
}

fn parse_param(raw: Option<&str>, message: &'static str) -> Result<Option<i64>, ApiError> {
    raw.filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|err| ApiError::bad_request(message, err))
        })
        .transpose()
}

fn decode_data(encoded: &str) -> Result<Vec<u8>, ApiError> {
    STANDARD
        .decode(encoded)
        .map_err(|err| ApiError::bad_request("Invalid Data", err))
}

async fn ping() -> Response {
    reply(StatusCode::OK, json!({ "message": "pong" }))
}

async fn version() -> Response {
    reply(
        StatusCode::OK,
        json!({
            "version": APP_VERSION,
            "schemaVersion": SCHEMA_VERSION,
            "message": format!("version {APP_VERSION} (schema {SCHEMA_VERSION})"),
        }),
    )
}

async fn insert_item(
    State(state): State<AppState>,
    body: Result<Json<ItemBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|err| ApiError::bad_request("Invalid JSON", err))?;
    let data = decode_data(&body.data)?;
    let time = body.time;
    let item = with_db(&state, "Error inserting Item", move |db| {
        db.create(NewItem { time, data: &data })
    })
    .await?;

    Ok(reply(
        StatusCode::CREATED,
        json!({
            "message": "Item created successfully",
            "Item": JsonItem::from(&item),
        }),
    ))
}

async fn upsert_item(
    State(state): State<AppState>,
    Path(time): Path<String>,
    body: Result<Json<DataBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let time = parse_time(&time)?;
    let Json(body) = body.map_err(|err| ApiError::bad_request("Invalid JSON", err))?;
    let data = decode_data(&body.data)?;
    let outcome = with_db(&state, "Error upserting Item", move |db| {
        db.upsert(NewItem { time, data: &data })
    })
    .await?;

    let (status, message) = match outcome {
        Upserted::Created => (StatusCode::CREATED, "Item created successfully"),
        Upserted::Updated => (StatusCode::OK, "Item updated successfully"),
    };
    Ok(reply(status, json!({ "message": message, "ItemTime": time })))
}

async fn take_item(
    State(state): State<AppState>,
    Path(time): Path<String>,
) -> Result<Response, ApiError> {
    let time = parse_time(&time)?;
    let item = with_db(&state, "Error taking Item", move |db| db.first(time)).await?;

    Ok(reply(
        StatusCode::OK,
        json!({
            "message": "Item taken successfully",
            "Item": JsonItem::from(&item),
        }),
    ))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(time): Path<String>,
) -> Result<Response, ApiError> {
    let time = parse_time(&time)?;
    with_db(&state, "Error deleting Item", move |db| db.delete(time)).await?;

    Ok(reply(
        StatusCode::OK,
        json!({ "message": "Item deleted successfully", "ItemTime": time }),
    ))
}

async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let range = TimeRange {
        start: parse_param(params.start_time.as_deref(), "Invalid startTime")?,
        end: parse_param(params.end_time.as_deref(), "Invalid endTime")?,
    };
    let limit = parse_param(params.limit.as_deref(), "Invalid limit")?.unwrap_or(DEFAULT_LIMIT);
    let times = with_db(&state, "Error getting Items", move |db| {
        db.list_times(range, limit)
    })
    .await?;

    Ok(reply(
        StatusCode::OK,
        json!({
            "message": "Items found successfully",
            "requested_form": {
                "startTime": params.start_time,
                "endTime": params.end_time,
                "limit": params.limit,
            },
            "Items": times,
        }),
    ))
}

async fn item_count(State(state): State<AppState>) -> Result<Response, ApiError> {
    let count = with_db(&state, "Error getting item count", |db| {
        db.count(TimeRange::default())
    })
    .await?;

    Ok(reply(
        StatusCode::OK,
        json!({ "count": count, "message": format!("{count} items in clipboard") }),
    ))
}

async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let limit = parse_param(params.limit.as_deref(), "Invalid limit")?.unwrap_or(DEFAULT_LIMIT);
    let query = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    // An absent query matches nothing.
    let items = match query {
        Some(query) => {
            with_db(&state, "Error searching Items", move |db| {
                db.search_text(&query, limit)
            })
            .await?
        }
        None => Vec::new(),
    };

    let items: Vec<JsonItem> = items.iter().map(JsonItem::from).collect();
    Ok(reply(
        StatusCode::OK,
        json!({
            "message": "Items found successfully",
            "count": items.len(),
            "Items": items,
        }),
    ))
}
