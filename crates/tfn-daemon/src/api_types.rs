//! Request and response types for all tfn-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tfn_ledger::GroupBy;
use tfn_schemas::{
    AttendanceInput, BillStatus, FieldError, MealType, NewNotification, Plan, SubscriptionStatus,
};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Every 2xx body: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Every 4xx/5xx body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    /// Stable code: VALIDATION | CONFLICT | NOT_FOUND | UNAUTHORIZED | FORBIDDEN | INTERNAL
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub push_channels: usize,
}

// ---------------------------------------------------------------------------
// /v1/attendance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceBatchRequest {
    pub records: Vec<AttendanceInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceListQuery {
    pub subscriber_id: Option<String>,
    pub meal_type: Option<MealType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailySummaryQuery {
    /// Defaults to the business date.
    pub date: Option<NaiveDate>,
    pub meal_type: Option<MealType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSummaryQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub meal_type: Option<MealType>,
    #[serde(default)]
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// ---------------------------------------------------------------------------
// /v1/bills
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillListQuery {
    pub subscriber_id: Option<String>,
    pub status: Option<BillStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillStatusRequest {
    pub status: BillStatus,
}

// ---------------------------------------------------------------------------
// /v1/subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionListQuery {
    pub subscriber_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<Plan>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionStatusRequest {
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiringQuery {
    /// Defaults to 7.
    pub days: Option<u32>,
}

// ---------------------------------------------------------------------------
// /v1/notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxQuery {
    /// Defaults to the caller.
    pub subscriber_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationBatchRequest {
    pub notifications: Vec<NewNotification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadAllRequest {
    /// Defaults to the caller.
    #[serde(default)]
    pub subscriber_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadAllResponse {
    pub marked: u64,
}
