//! Maintenance request model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Trade category of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Electrical,
    Civil,
    Plumbing,
    Ac,
    Equipment,
    Belts,
    FireAlarm,
    Ups,
    Generator,
    FireFighting,
    Cleaning,
    PestControl,
    /// Fallback for external tickets whose category has no trade mapping
    General,
}

impl RequestType {
    pub const ALL: [RequestType; 13] = [
        RequestType::Electrical,
        RequestType::Civil,
        RequestType::Plumbing,
        RequestType::Ac,
        RequestType::Equipment,
        RequestType::Belts,
        RequestType::FireAlarm,
        RequestType::Ups,
        RequestType::Generator,
        RequestType::FireFighting,
        RequestType::Cleaning,
        RequestType::PestControl,
        RequestType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Electrical => "electrical",
            RequestType::Civil => "civil",
            RequestType::Plumbing => "plumbing",
            RequestType::Ac => "ac",
            RequestType::Equipment => "equipment",
            RequestType::Belts => "belts",
            RequestType::FireAlarm => "fire_alarm",
            RequestType::Ups => "ups",
            RequestType::Generator => "generator",
            RequestType::FireFighting => "fire_fighting",
            RequestType::Cleaning => "cleaning",
            RequestType::PestControl => "pest_control",
            RequestType::General => "general",
        }
    }

    /// Parse the wire name of a trade category
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "request_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPriority::Low => "low",
            RequestPriority::Medium => "medium",
            RequestPriority::High => "high",
            RequestPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a request
///
/// `Completed` and `Cancelled` are terminal for the completion timestamp rule;
/// an authorized update may still move a request out of them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    New,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "new",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request originated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "request_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    #[default]
    Internal,
    External,
}

/// Comment attached to a request; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Spare part needed to complete a request; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredPart {
    pub part_name: String,
    pub quantity: u32,
    pub available_in_stock: bool,
    pub requested_at: DateTime<Utc>,
}

/// Maintenance request entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequest {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub category: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub location: Option<String>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub images: Vec<String>,
    #[sqlx(json)]
    pub comments: Vec<Comment>,
    #[sqlx(json)]
    pub required_parts: Vec<RequiredPart>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub external_id: Option<String>,
    pub source: RequestSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceRequest {
    /// Build a request from a creation payload, stamped at `now`
    pub fn new(draft: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            request_type: draft.request_type,
            category: draft.category,
            priority: draft.priority,
            status: draft.status,
            location: draft.location,
            created_by: draft.created_by,
            assigned_to: None,
            images: draft.images,
            comments: Vec::new(),
            required_parts: Vec::new(),
            completed_at: (draft.status == RequestStatus::Completed).then_some(now),
            estimated_hours: None,
            actual_hours: None,
            external_id: draft.external_id,
            source: draft.source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whole days elapsed since creation
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }

    /// Hours between creation and completion, once completed
    pub fn resolution_hours(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_seconds() as f64 / 3600.0)
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.created_by == user_id || self.assigned_to == Some(user_id)
    }
}

/// Request creation payload
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub request_type: RequestType,
    pub category: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub location: Option<String>,
    pub created_by: Uuid,
    pub images: Vec<String>,
    pub external_id: Option<String>,
    pub source: RequestSource,
}

/// Update requested by a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub request_type: Option<RequestType>,
    pub category: Option<String>,
    pub priority: Option<RequestPriority>,
    pub status: Option<RequestStatus>,
    pub assigned_to: Option<Uuid>,
    pub location: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}

/// Field-level changes written to the store
///
/// Fields left as `None` are not touched, so concurrent writers only overwrite
/// the fields they actually change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub request_type: Option<RequestType>,
    pub category: Option<String>,
    pub priority: Option<RequestPriority>,
    pub status: Option<RequestStatus>,
    pub assigned_to: Option<Uuid>,
    pub location: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RequestChanges {
    pub fn is_empty(&self) -> bool {
        *self == RequestChanges::default()
    }

    /// Apply the changes to an in-memory copy of a request
    pub fn apply_to(&self, request: &mut MaintenanceRequest, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            request.title = title.clone();
        }
        if let Some(description) = &self.description {
            request.description = description.clone();
        }
        if let Some(request_type) = self.request_type {
            request.request_type = request_type;
        }
        if let Some(category) = &self.category {
            request.category = category.clone();
        }
        if let Some(priority) = self.priority {
            request.priority = priority;
        }
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(assignee) = self.assigned_to {
            request.assigned_to = Some(assignee);
        }
        if let Some(location) = &self.location {
            request.location = Some(location.clone());
        }
        if let Some(hours) = self.estimated_hours {
            request.estimated_hours = Some(hours);
        }
        if let Some(hours) = self.actual_hours {
            request.actual_hours = Some(hours);
        }
        if let Some(completed_at) = self.completed_at {
            request.completed_at = Some(completed_at);
        }
        request.updated_at = now;
    }
}

/// Listing filter with pagination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    #[serde(rename = "type")]
    pub request_type: Option<RequestType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl RequestFilter {
    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to 1..=100
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) as i64 * self.limit() as i64
    }

    pub fn matches(&self, request: &MaintenanceRequest) -> bool {
        self.status.is_none_or(|s| s == request.status)
            && self.request_type.is_none_or(|t| t == request.request_type)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(rename = "requests")]
    pub items: Vec<T>,
    pub total: i64,
    pub current_page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, filter: &RequestFilter) -> Self {
        let limit = filter.limit();
        let total_pages = (total.max(0) as u64).div_ceil(limit as u64) as u32;
        Self {
            items,
            total,
            current_page: filter.page(),
            limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            current_page: self.current_page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Count of requests sharing a status and a type
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StatusTypeCount {
    pub status: RequestStatus,
    pub request_type: RequestType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub count: i64,
}

/// Overview counters of the requests visible to a user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: i64,
    pub new: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub type_stats: Vec<TypeCount>,
}
