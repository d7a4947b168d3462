//! API models for request and response payloads

use chrono::{DateTime, Utc};
use domain::models::MaintenanceRequest;
use serde::{Deserialize, Serialize};

/// Maintenance request as returned by the API, with derived fields
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: MaintenanceRequest,
    pub age_in_days: i64,
    pub resolution_hours: Option<f64>,
}

impl RequestView {
    pub fn at(request: MaintenanceRequest, now: DateTime<Utc>) -> Self {
        Self {
            age_in_days: request.age_in_days(now),
            resolution_hours: request.resolution_hours(),
            request,
        }
    }
}

/// Request for adding a comment
#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

/// Request for activating or deactivating an account
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusRequest {
    pub is_active: bool,
}
