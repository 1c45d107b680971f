use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ulid::Ulid;

use crate::config::Config;
use crate::engine::{BulkAction, BulkReport, Engine, EngineError, MonthGrid};
use crate::model::{
    parse_iso_date, parse_iso_month, normalize_order_date, BlockedDate, Booking, BookingStatus,
    CakeDetails, CustomerInfo, OverrideReason,
};
use crate::registry::{StoreRegistry, DEFAULT_STORE};

#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<StoreRegistry>,
    pub config: Arc<Config>,
}

// ── Error mapping ────────────────────────────────────────────────

pub enum ApiError {
    Engine(EngineError),
    Unauthorized,
    Store(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::InvalidDate(_)
                    | EngineError::InvalidRange { .. }
                    | EngineError::PastDate(_)
                    | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
                    EngineError::BookingNotFound(_) => StatusCode::NOT_FOUND,
                    EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    EngineError::Storage(_) => {
                        tracing::error!("storage error: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "admin token required".into()),
            ApiError::Store(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Shared extractors ────────────────────────────────────────────

/// Resolve the storefront engine for a request. Absent header means the
/// default store.
fn store_engine(state: &AppState, headers: &HeaderMap) -> Result<Arc<Engine>, ApiError> {
    let store = headers
        .get("x-storefront")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_STORE);
    state
        .stores
        .get_or_create(store)
        .map_err(|e| ApiError::Store(format!("store unavailable: {e}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeQuery {
    start_date: String,
    end_date: String,
}

impl RangeQuery {
    fn parse(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        Ok((parse_iso_date(&self.start_date)?, parse_iso_date(&self.end_date)?))
    }
}

// ── Public handlers ──────────────────────────────────────────────

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnavailableDatesResponse {
    unavailable_dates: Vec<NaiveDate>,
}

/// GET /available-dates — every date the customer-facing picker must
/// disable. Errors propagate; the caller decides how to fail closed.
async fn available_dates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(range): Query<RangeQuery>,
) -> Result<Json<UnavailableDatesResponse>, ApiError> {
    let (start, end) = range.parse()?;
    let engine = store_engine(&state, &headers)?;
    let unavailable_dates = engine
        .unavailable_dates(start, end, state.config.today())
        .await?;
    Ok(Json(UnavailableDatesResponse { unavailable_dates }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingsQuery {
    start_date: String,
    end_date: String,
    #[serde(default)]
    include_cancelled: bool,
}

async fn list_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let start = parse_iso_date(&query.start_date)?;
    let end = parse_iso_date(&query.end_date)?;
    let engine = store_engine(&state, &headers)?;
    let bookings = engine
        .bookings_in_range(start, end, query.include_cancelled)
        .await?;
    Ok(Json(bookings))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    /// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (historical form).
    order_date: String,
    customer_info: CustomerInfo,
    cake_details: CakeDetails,
    #[serde(default = "default_booking_status")]
    status: BookingStatus,
}

fn default_booking_status() -> BookingStatus {
    BookingStatus::Pending
}

/// POST /bookings — checkout-completion callback. Capacity is not enforced
/// here; the booking flow gates on the availability query.
async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let order_date = normalize_order_date(&req.order_date, state.config.tz_offset_minutes)?;
    let engine = store_engine(&state, &headers)?;
    let booking = engine
        .create_booking(
            order_date,
            req.customer_info,
            req.cake_details,
            req.status,
            state.config.today(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Deserialize)]
struct StatusChangeRequest {
    status: BookingStatus,
}

async fn change_booking_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Ulid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Booking>, ApiError> {
    let engine = store_engine(&state, &headers)?;
    let booking = engine.set_booking_status(id, req.status).await?;
    Ok(Json(booking))
}

// ── Admin handlers ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionalRangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn list_blocked_dates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OptionalRangeQuery>,
) -> Result<Json<Vec<BlockedDate>>, ApiError> {
    let range = match (&query.start_date, &query.end_date) {
        (Some(start), Some(end)) => Some((parse_iso_date(start)?, parse_iso_date(end)?)),
        (None, None) => None,
        _ => {
            return Err(ApiError::Store(
                "startDate and endDate must be given together".into(),
            ))
        }
    };
    let engine = store_engine(&state, &headers)?;
    Ok(Json(engine.list_overrides(range).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertBlockedDateRequest {
    date: String,
    reason: OverrideReason,
    capacity: Option<u32>,
}

async fn upsert_blocked_date(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpsertBlockedDateRequest>,
) -> Result<Json<BlockedDate>, ApiError> {
    let date = parse_iso_date(&req.date)?;
    let engine = store_engine(&state, &headers)?;
    let record = engine
        .upsert_override(date, req.reason, req.capacity, state.config.today())
        .await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct DateQuery {
    date: String,
}

async fn delete_blocked_date(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<StatusCode, ApiError> {
    let date = parse_iso_date(&query.date)?;
    let engine = store_engine(&state, &headers)?;
    engine.clear_override(date, state.config.today()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustCapacityRequest {
    date: String,
    /// +1 / -1 from the dashboard stepper; the result clamps at zero.
    delta: i64,
}

async fn adjust_capacity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdjustCapacityRequest>,
) -> Result<Json<BlockedDate>, ApiError> {
    let date = parse_iso_date(&req.date)?;
    let engine = store_engine(&state, &headers)?;
    let record = engine
        .adjust_capacity(date, req.delta, state.config.today())
        .await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkRequest {
    dates: Vec<String>,
    action: BulkAction,
}

async fn bulk_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkReport>, ApiError> {
    // Malformed dates fail the whole request; semantic per-date failures
    // (past dates, storage errors) land in the report instead.
    let dates = req
        .dates
        .iter()
        .map(|raw| parse_iso_date(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let engine = store_engine(&state, &headers)?;
    let report = engine
        .apply_bulk(&dates, req.action, state.config.today())
        .await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct MonthQuery {
    month: String,
}

async fn schedule_grid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthGrid>, ApiError> {
    let first = parse_iso_month(&query.month)?;
    let engine = store_engine(&state, &headers)?;
    Ok(Json(engine.month_grid(first, state.config.today()).await?))
}

// ── Middleware ───────────────────────────────────────────────────

async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = format!("Bearer {}", state.config.admin_token);
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) {
        metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().to_string();

    let start = Instant::now();
    let response = next.run(req).await;

    metrics::counter!(
        crate::observability::HTTP_REQUESTS_TOTAL,
        "route" => route.clone(),
        "method" => method,
        "status" => response.status().as_u16().to_string(),
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::HTTP_REQUEST_DURATION_SECONDS,
        "route" => route,
    )
    .record(start.elapsed().as_secs_f64());

    response
}

// ── Router ───────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/blocked-dates", get(list_blocked_dates))
        .route("/blocked-dates", post(upsert_blocked_date))
        .route("/blocked-dates", delete(delete_blocked_date))
        .route("/blocked-dates/capacity", post(adjust_capacity))
        .route("/schedule/bulk", post(bulk_apply))
        .route("/schedule", get(schedule_grid))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    let booking_admin = Router::new()
        .route("/bookings/{id}/status", patch(change_booking_status))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/available-dates", get(available_dates))
        .route("/bookings", get(list_bookings))
        .route("/bookings", post(create_booking))
        .merge(booking_admin)
        .nest("/admin", admin)
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}
