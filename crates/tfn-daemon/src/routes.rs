//! Axum router and all HTTP handlers for tfn-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  Handlers are thin: parse, authorize the caller, call
//! one service method, wrap the result.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, patch, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use tfn_billing::{BillView, GenerateBill};
use tfn_ledger::{DailySummary, RangeSummary, SubscriberHistory};
use tfn_notify::EmitReport;
use tfn_schemas::{
    AttendanceFilter, AttendanceInput, AttendanceRecord, Bill, BillFilter, DateRange,
    NewNotification, Notification, Page, PageRequest, Result, SubscriberId, Subscription,
    SubscriptionFilter, SubscriptionInput, SubscriptionPatch,
};
use tfn_subscription::{SubscriptionStats, SweepReport};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    api_types::{
        ApiOk, AttendanceBatchRequest, AttendanceListQuery, BillListQuery, BillStatusRequest,
        DailySummaryQuery, ExpiringQuery, HealthResponse, HistoryQuery, InboxQuery,
        NotificationBatchRequest, RangeSummaryQuery, ReadAllRequest, ReadAllResponse,
        SubscriptionListQuery, SubscriptionStatusRequest, UnreadCountResponse,
    },
    auth::Caller,
    error::ApiError,
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// `axum::Json` whose rejection is a VALIDATION body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

type ApiResult<T> = std::result::Result<Json<ApiOk<T>>, ApiError>;
type Created<T> = std::result::Result<(StatusCode, Json<ApiOk<T>>), ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiOk::new(data)))
}

fn created<T: Serialize>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiOk::new(data))))
}

fn parse_subscriber(raw: Option<&str>) -> Result<Option<SubscriberId>> {
    raw.map(SubscriberId::parse).transpose()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        // attendance
        .route("/v1/attendance", post(attendance_record).get(attendance_list))
        .route("/v1/attendance/batch", post(attendance_batch))
        .route("/v1/attendance/summary/daily", get(attendance_daily))
        .route("/v1/attendance/summary/range", get(attendance_range))
        .route("/v1/attendance/history/:subscriber_id", get(attendance_history))
        .route(
            "/v1/attendance/:id",
            get(attendance_get)
                .put(attendance_update)
                .delete(attendance_delete),
        )
        // bills
        .route("/v1/bills", get(bills_list))
        .route("/v1/bills/generate", post(bills_generate))
        .route("/v1/bills/:id", get(bills_get))
        .route("/v1/bills/:id/reconciled", get(bills_reconciled))
        .route("/v1/bills/:id/status", patch(bills_status))
        // subscriptions
        .route(
            "/v1/subscriptions",
            post(subscriptions_create).get(subscriptions_list),
        )
        .route("/v1/subscriptions/sweep", post(subscriptions_sweep))
        .route("/v1/subscriptions/expiring", get(subscriptions_expiring))
        .route("/v1/subscriptions/stats", get(subscriptions_stats))
        .route(
            "/v1/subscriptions/:id",
            get(subscriptions_get).put(subscriptions_update),
        )
        .route("/v1/subscriptions/:id/status", patch(subscriptions_status))
        // notifications
        .route(
            "/v1/notifications",
            get(notifications_list).post(notifications_send),
        )
        .route("/v1/notifications/batch", post(notifications_batch))
        .route("/v1/notifications/unread-count", get(notifications_unread))
        .route("/v1/notifications/read-all", post(notifications_read_all))
        .route("/v1/notifications/stream", get(notifications_stream))
        .route("/v1/notifications/:id/read", patch(notifications_mark_read))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            push_channels: st.fanout.registry().total_channels(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/attendance
// ---------------------------------------------------------------------------

pub(crate) async fn attendance_record(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(input): ApiJson<AttendanceInput>,
) -> Created<AttendanceRecord> {
    created(st.ledger.record(&me, input).await?)
}

pub(crate) async fn attendance_batch(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(req): ApiJson<AttendanceBatchRequest>,
) -> Created<Vec<AttendanceRecord>> {
    created(st.ledger.record_batch(&me, req.records).await?)
}

/// Members are always scoped to their own records.
pub(crate) async fn attendance_list(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<AttendanceListQuery>,
) -> ApiResult<Page<AttendanceRecord>> {
    let mut subscriber_id = parse_subscriber(q.subscriber_id.as_deref())?;
    if !me.is_owner() {
        subscriber_id = Some(me.subscriber_id.clone());
    }
    let filter = AttendanceFilter {
        subscriber_id,
        meal_type: q.meal_type,
        range: DateRange::new(q.from, q.to),
    };
    let page = PageRequest::new(q.page, q.page_size)?;
    ok(st.ledger.query(&filter, page).await?)
}

pub(crate) async fn attendance_get(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AttendanceRecord> {
    let record = st.ledger.get(id).await?;
    me.require_self_or_owner(&record.subscriber_id)?;
    ok(record)
}

pub(crate) async fn attendance_update(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AttendanceInput>,
) -> ApiResult<AttendanceRecord> {
    ok(st.ledger.update(&me, id, input).await?)
}

pub(crate) async fn attendance_delete(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AttendanceRecord> {
    ok(st.ledger.delete(&me, id).await?)
}

pub(crate) async fn attendance_daily(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<DailySummaryQuery>,
) -> ApiResult<DailySummary> {
    me.require_owner()?;
    let date = q.date.unwrap_or_else(|| st.clock.today());
    ok(st.ledger.daily_summary(date, q.meal_type).await?)
}

pub(crate) async fn attendance_range(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<RangeSummaryQuery>,
) -> ApiResult<RangeSummary> {
    me.require_owner()?;
    ok(st
        .ledger
        .range_summary(DateRange::between(q.from, q.to), q.meal_type, q.group_by)
        .await?)
}

pub(crate) async fn attendance_history(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(raw): ApiPath<String>,
    ApiQuery(q): ApiQuery<HistoryQuery>,
) -> ApiResult<SubscriberHistory> {
    let subscriber = SubscriberId::parse(&raw)?;
    me.require_self_or_owner(&subscriber)?;
    let page = PageRequest::new(q.page, q.page_size)?;
    ok(st
        .ledger
        .subscriber_history(&subscriber, DateRange::new(q.from, q.to), page)
        .await?)
}

// ---------------------------------------------------------------------------
// /v1/bills
// ---------------------------------------------------------------------------

pub(crate) async fn bills_generate(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(req): ApiJson<GenerateBill>,
) -> Created<Bill> {
    created(st.billing.generate(&me, req).await?)
}

pub(crate) async fn bills_list(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<BillListQuery>,
) -> ApiResult<Vec<Bill>> {
    let filter = BillFilter {
        subscriber_id: parse_subscriber(q.subscriber_id.as_deref())?,
        status: q.status,
    };
    ok(st.billing.list(&me, filter).await?)
}

pub(crate) async fn bills_get(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Bill> {
    ok(st.billing.get(&me, id).await?)
}

pub(crate) async fn bills_reconciled(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<BillView> {
    ok(st.billing.reconciled(&me, id).await?)
}

pub(crate) async fn bills_status(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<BillStatusRequest>,
) -> ApiResult<Bill> {
    ok(st.billing.update_status(&me, id, req.status).await?)
}

// ---------------------------------------------------------------------------
// /v1/subscriptions
// ---------------------------------------------------------------------------

pub(crate) async fn subscriptions_create(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(input): ApiJson<SubscriptionInput>,
) -> Created<Subscription> {
    created(st.subscriptions.create(&me, input).await?)
}

fn subscription_filter(q: &SubscriptionListQuery) -> Result<SubscriptionFilter> {
    Ok(SubscriptionFilter {
        subscriber_id: parse_subscriber(q.subscriber_id.as_deref())?,
        status: q.status,
        plan: q.plan,
    })
}

pub(crate) async fn subscriptions_list(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<SubscriptionListQuery>,
) -> ApiResult<Page<Subscription>> {
    let filter = subscription_filter(&q)?;
    let page = PageRequest::new(q.page, q.page_size)?;
    ok(st.subscriptions.list(&me, filter, page).await?)
}

pub(crate) async fn subscriptions_get(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Subscription> {
    ok(st.subscriptions.get(&me, id).await?)
}

pub(crate) async fn subscriptions_update(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<SubscriptionPatch>,
) -> ApiResult<Subscription> {
    ok(st.subscriptions.update(&me, id, patch).await?)
}

pub(crate) async fn subscriptions_status(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SubscriptionStatusRequest>,
) -> ApiResult<Subscription> {
    ok(st.subscriptions.set_status(&me, id, req.status).await?)
}

pub(crate) async fn subscriptions_sweep(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
) -> ApiResult<SweepReport> {
    me.require_owner()?;
    info!(by = %me.actor(), "subscription/sweep_requested");
    ok(st.subscriptions.sweep_now().await?)
}

pub(crate) async fn subscriptions_expiring(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<ExpiringQuery>,
) -> ApiResult<Vec<Subscription>> {
    ok(st
        .subscriptions
        .list_expiring_within(&me, q.days.unwrap_or(7))
        .await?)
}

pub(crate) async fn subscriptions_stats(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<SubscriptionListQuery>,
) -> ApiResult<SubscriptionStats> {
    let filter = subscription_filter(&q)?;
    ok(st.subscriptions.stats(&me, filter).await?)
}

// ---------------------------------------------------------------------------
// /v1/notifications
// ---------------------------------------------------------------------------

fn inbox_target(me: &tfn_schemas::Identity, raw: Option<&str>) -> Result<SubscriberId> {
    Ok(parse_subscriber(raw)?.unwrap_or_else(|| me.subscriber_id.clone()))
}

pub(crate) async fn notifications_list(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<InboxQuery>,
) -> ApiResult<Vec<Notification>> {
    let target = inbox_target(&me, q.subscriber_id.as_deref())?;
    ok(st.fanout.list(&me, &target, q.limit).await?)
}

pub(crate) async fn notifications_unread(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiQuery(q): ApiQuery<InboxQuery>,
) -> ApiResult<UnreadCountResponse> {
    let target = inbox_target(&me, q.subscriber_id.as_deref())?;
    let unread = st.fanout.unread_count(&me, &target).await?;
    ok(UnreadCountResponse { unread })
}

pub(crate) async fn notifications_send(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(n): ApiJson<NewNotification>,
) -> Created<EmitReport> {
    created(st.fanout.notify(&me, n).await?)
}

pub(crate) async fn notifications_batch(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiJson(req): ApiJson<NotificationBatchRequest>,
) -> Created<Vec<EmitReport>> {
    created(st.fanout.notify_batch(&me, req.notifications).await?)
}

pub(crate) async fn notifications_mark_read(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Notification> {
    ok(st.fanout.mark_read(&me, id).await?)
}

/// The body is optional; without one the caller's own inbox is cleared.
pub(crate) async fn notifications_read_all(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
    body: Option<ApiJson<ReadAllRequest>>,
) -> ApiResult<ReadAllResponse> {
    let raw = body.and_then(|ApiJson(req)| req.subscriber_id);
    let target = inbox_target(&me, raw.as_deref())?;
    let marked = st.fanout.mark_all_read(&me, &target).await?;
    ok(ReadAllResponse { marked })
}

// ---------------------------------------------------------------------------
// GET /v1/notifications/stream  (SSE push channel)
// ---------------------------------------------------------------------------

/// Registers a push channel for the caller for as long as the response
/// stream lives. The first event is `ready` carrying the channel id.
pub(crate) async fn notifications_stream(
    State(st): State<Arc<AppState>>,
    Caller(me): Caller,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let (guard, rx) = st.fanout.registry().register(me.subscriber_id.clone());
    info!(channel = %guard.id(), subscriber = %me.subscriber_id, "channel/stream_opened");

    let ready = Event::default().event("ready").data(guard.id().to_string());
    let pushes = ReceiverStream::new(rx).map(move |frame| {
        // The guard rides along with the stream; dropping the stream unregisters.
        let _ = guard.id();
        Event::default().event("notification").json_data(&*frame)
    });
    let events = stream::once(async move { Ok(ready) }).chain(pushes);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}
