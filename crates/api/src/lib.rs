//! Shared API types, crypto, and SQL builders for coldcall.
//!
//! This crate is the single source of truth for all API request/response
//! types and for the queries behind them. The Axum server and the
//! maintenance CLI both build on it.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod crypto;
pub mod db;
pub mod service;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Account role. Stored uppercase in the `users.role` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Caller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Caller => "CALLER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "CALLER" => Some(Self::Caller),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a logged call. Stored uppercase in the `calls.outcome` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOutcome {
    Interested,
    NotInterested,
    NoAnswer,
    Callback,
    OrderTaken,
}

impl CallOutcome {
    pub const ALL: [CallOutcome; 5] = [
        Self::Interested,
        Self::NotInterested,
        Self::NoAnswer,
        Self::Callback,
        Self::OrderTaken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interested => "INTERESTED",
            Self::NotInterested => "NOT_INTERESTED",
            Self::NoAnswer => "NO_ANSWER",
            Self::Callback => "CALLBACK",
            Self::OrderTaken => "ORDER_TAKEN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INTERESTED" => Some(Self::Interested),
            "NOT_INTERESTED" => Some(Self::NotInterested),
            "NO_ANSWER" => Some(Self::NoAnswer),
            "CALLBACK" => Some(Self::Callback),
            "ORDER_TAKEN" => Some(Self::OrderTaken),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error from shared business logic, mapped to an HTTP status by the server.
#[derive(Debug)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => f.write_str(m),
        }
    }
}

impl std::error::Error for ServiceError {}

// ─── Envelopes ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Envelope for bulk updates: success flag plus affected-row count.
#[derive(Debug, Serialize, Deserialize)]
pub struct AffectedResponse {
    pub ok: bool,
    pub affected: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub ok: bool,
    pub deleted: u64,
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The authenticated user as returned by login and session check.
/// Never carries credential fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub daily_target: i64,
    pub must_reset_password: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A user row as exposed to admins (no credential fields).
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub daily_target: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub daily_target: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub daily_target: Option<i64>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.display_name.is_none()
            && self.role.is_none()
            && self.daily_target.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_user_id: String,
    pub to_user_id: String,
}

// ─── Practices ───────────────────────────────────────────────────────────────

/// Most recent call logged against a practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastCall {
    pub outcome: String,
    pub called_at: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub id: String,
    pub name: String,
    pub region: String,
    pub manager: Option<String>,
    /// Parsed from the JSON-array `phones` column.
    pub phones: Vec<String>,
    pub cities_served: Option<String>,
    pub preferred_caller_id: Option<String>,
    pub created_at: String,
    pub last_call: Option<LastCall>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PracticeListResponse {
    pub practices: Vec<PracticeSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct PracticeListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_practice_limit")]
    pub limit: u32,
    pub region: Option<String>,
    pub city: Option<String>,
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}
fn default_practice_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreatePracticeRequest {
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub preferred_caller_id: Option<String>,
}

/// Partial practice update. `preferred_caller_id` distinguishes "absent"
/// (leave alone) from explicit `null` (clear the assignment).
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePracticeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub cities_served: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub phones: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub preferred_caller_id: Option<Option<String>>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

impl UpdatePracticeRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.region.is_none()
            && self.cities_served.is_none()
            && self.manager.is_none()
            && self.phones.is_none()
            && self.preferred_caller_id.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub practice_ids: Vec<String>,
    /// `None`, empty, or the literal string "null" unassigns.
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionsResponse {
    pub regions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionCount {
    pub region: String,
    pub practice_count: i64,
    pub city_count: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CityCount {
    pub name: String,
    pub count: i64,
    /// Practices in the city not yet closed out as interested/rejected.
    pub available: i64,
}

#[derive(Debug, Deserialize)]
pub struct LocationsQuery {
    pub region: Option<String>,
}

// ─── Calls ───────────────────────────────────────────────────────────────────

/// A call joined with practice and caller columns for list views.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallRow {
    pub id: String,
    pub practice_id: String,
    pub caller_id: String,
    pub outcome: String,
    pub notes: Option<String>,
    pub called_at: String,
    pub practice_name: String,
    pub phones: Vec<String>,
    pub caller_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallListResponse {
    pub calls: Vec<CallRow>,
}

#[derive(Debug, Deserialize)]
pub struct CallListQuery {
    pub practice_id: Option<String>,
    pub caller_id: Option<String>,
    /// YYYY-MM-DD; matches on the calendar day of `called_at`.
    pub date: Option<String>,
    #[serde(default = "default_call_limit")]
    pub limit: u32,
}

fn default_call_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct LogCallRequest {
    pub practice_id: String,
    /// Validated against [`CallOutcome`] by the handler.
    pub outcome: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogCallResponse {
    pub ok: bool,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCallRequest {
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ─── Assignments ─────────────────────────────────────────────────────────────

/// An assignment joined with practice and caller columns for list views.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub id: String,
    pub date: String,
    pub practice_id: String,
    pub caller_id: String,
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub practice_name: String,
    pub region: String,
    pub phones: Vec<String>,
    pub manager: Option<String>,
    pub cities_served: Option<String>,
    pub caller_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentListQuery {
    pub date: Option<String>,
    /// Start of a multi-day window (YYYY-MM-DD); combined with `days`.
    pub week: Option<String>,
    #[serde(default = "default_window_days")]
    pub days: u32,
    pub caller_id: Option<String>,
    /// Admin only: include the per-day breakdown.
    #[serde(default)]
    pub stats: bool,
}

fn default_window_days() -> u32 {
    7
}

/// Per-caller slice of a day's assignments (calendar view).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CallerDayStats {
    pub name: String,
    pub total: i64,
    pub completed: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callback: i64,
    pub other: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DayStats {
    pub regions: BTreeMap<String, i64>,
    pub callers: BTreeMap<String, CallerDayStats>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignmentListResponse {
    pub assignments: Vec<AssignmentRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_stats: Option<BTreeMap<String, DayStats>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateScheduleRequest {
    /// YYYY-MM-DD first day of the window.
    pub start_date: String,
    #[serde(default = "default_window_days")]
    pub days: u32,
    #[serde(default)]
    pub regions: Option<Vec<String>>,
    #[serde(default)]
    pub cities: Option<Vec<String>>,
    #[serde(default)]
    pub caller_ids: Option<Vec<String>>,
    /// Keep existing assignments in the window instead of clearing them.
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateScheduleResponse {
    pub ok: bool,
    pub total_assignments: u64,
    pub available_practices: u64,
    pub region_breakdown: BTreeMap<String, i64>,
    pub callers_assigned: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAssignmentsQuery {
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub region: Option<String>,
}

// ─── Campaigns (derived from assignment date ranges) ─────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Completed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub regions: Vec<String>,
    pub status: CampaignStatus,
    pub total_assignments: i64,
    pub completed_assignments: i64,
    pub outcomes: BTreeMap<String, i64>,
    pub dates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignsResponse {
    pub campaigns: Vec<CampaignSummary>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCampaignQuery {
    pub start_date: String,
    pub end_date: String,
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeStatsResponse {
    /// date → outcome → count.
    pub stats: BTreeMap<String, BTreeMap<String, i64>>,
}

#[derive(Debug, Deserialize)]
pub struct RegionStatsQuery {
    pub region: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionProgress {
    pub region: String,
    pub total_practices: i64,
    pub called_practices: i64,
    pub interested_practices: i64,
    pub not_interested_practices: i64,
    pub callback_practices: i64,
    pub no_answer_practices: i64,
    pub uncalled_practices: i64,
    pub coverage_percent: i64,
    pub interest_rate: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionStatsResponse {
    pub stats: Vec<RegionProgress>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Overview {
    pub total_practices: i64,
    pub total_calls: i64,
    pub interested_rate: i64,
    pub active_callers: i64,
    pub today_calls: i64,
    pub today_capacity: i64,
    pub overall_coverage: i64,
    pub pending_callbacks: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionDashboard {
    pub region: String,
    pub total: i64,
    pub called: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callback: i64,
    pub order_taken: i64,
    pub coverage_percent: i64,
    pub interest_rate: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallerDashboard {
    pub id: String,
    pub username: String,
    pub daily_target: i64,
    pub total_calls: i64,
    pub today_calls: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callback: i64,
    pub order_taken: i64,
    pub days_active: i64,
    pub avg_per_day: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
    pub date: String,
    pub total: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callback: i64,
    pub order_taken: i64,
    pub other: i64,
}

impl DailyStats {
    pub fn empty(date: String) -> Self {
        Self {
            date,
            total: 0,
            interested: 0,
            not_interested: 0,
            no_answer: 0,
            callback: 0,
            order_taken: 0,
            other: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callback: i64,
    pub order_taken: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentCall {
    pub id: String,
    pub called_at: String,
    pub caller_name: String,
    pub practice_name: String,
    pub region: String,
    pub outcome: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyComparison {
    pub this_week: i64,
    pub last_week: i64,
    pub change_percent: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopPerformer {
    pub username: String,
    pub interested: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopRegion {
    pub region: String,
    pub interest_rate: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub overview: Overview,
    pub regions: Vec<RegionDashboard>,
    pub callers: Vec<CallerDashboard>,
    pub daily_stats: Vec<DailyStats>,
    pub outcomes: OutcomeTotals,
    pub recent_calls: Vec<RecentCall>,
    pub weekly: WeeklyComparison,
    pub top_performers: Vec<TopPerformer>,
    pub top_regions: Vec<TopRegion>,
}

#[derive(Debug, Deserialize)]
pub struct PlannerQuery {
    #[serde(default)]
    pub exclude_days: u32,
}

/// Per-region availability snapshot for planning a call window.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlannerRegion {
    pub region: String,
    pub total_practices: i64,
    pub called_practices: i64,
    pub coverage_percent: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub no_answer: i64,
    pub callbacks_pending: i64,
    pub interest_rate: i64,
    pub last_called: Option<String>,
    pub days_since_last: Option<i64>,
    pub available_practices: i64,
    pub preferred_available: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlannerResponse {
    pub regions: Vec<PlannerRegion>,
}

// ─── Admin maintenance ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupResponse {
    pub ok: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PurgeKind {
    Calls,
    Assignments,
    #[default]
    All,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    #[serde(rename = "type", default)]
    pub kind: PurgeKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub ok: bool,
    pub calls_deleted: u64,
    pub assignments_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_parse_accepts_exactly_the_enum() {
        for outcome in CallOutcome::ALL {
            assert_eq!(CallOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(CallOutcome::parse("interested"), None);
        assert_eq!(CallOutcome::parse("FOLLOW_UP"), None);
        assert_eq!(CallOutcome::parse(""), None);
    }

    #[test]
    fn role_round_trips_through_serde() {
        let json = serde_json::to_string(&Role::Caller).unwrap();
        assert_eq!(json, "\"CALLER\"");
        let back: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(back, Role::Admin);
    }

    #[test]
    fn practice_update_distinguishes_absent_from_null() {
        let absent: UpdatePracticeRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.preferred_caller_id, None);

        let cleared: UpdatePracticeRequest =
            serde_json::from_str(r#"{"preferred_caller_id":null}"#).unwrap();
        assert_eq!(cleared.preferred_caller_id, Some(None));

        let set: UpdatePracticeRequest =
            serde_json::from_str(r#"{"preferred_caller_id":"u1"}"#).unwrap();
        assert_eq!(set.preferred_caller_id, Some(Some("u1".to_string())));
    }

    #[test]
    fn purge_kind_defaults_to_all() {
        let q: PurgeQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.kind, PurgeKind::All);
        let q: PurgeQuery = serde_json::from_str(r#"{"type":"calls"}"#).unwrap();
        assert_eq!(q.kind, PurgeKind::Calls);
    }
}
