//! Maintenance request service
//!
//! Creation, reads, updates, comments, required parts and the overview
//! counters. Every operation asks `policy` what the caller may do and goes
//! through the repository for a single-row write.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::lifecycle::{plan_update, summarize};
use crate::models::{
    Comment, MaintenanceRequest, NewRequest, Page, RequestFilter, RequestPatch, RequestPriority,
    RequestSource, RequestStats, RequestStatus, RequestType, RequiredPart, Role, User,
};
use crate::notify::{self, Notifier};
use crate::policy::{self, Visibility};
use crate::repositories::{MaintenanceRepository, UserRepository};
use crate::validation::{required_text, validate_images, validate_title};

const REQUEST_NOT_FOUND: &str = "Maintenance request not found";

/// Request creation input as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub request_type: String,
    #[serde(default)]
    pub category: String,
    pub priority: Option<RequestPriority>,
    pub location: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Required-part input as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPart {
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub quantity: i64,
    pub available_in_stock: Option<bool>,
}

/// Maintenance request service
#[derive(Clone)]
pub struct MaintenanceService {
    requests: Arc<dyn MaintenanceRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
}

impl MaintenanceService {
    pub fn new(
        requests: Arc<dyn MaintenanceRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requests,
            users,
            notifier,
        }
    }

    pub async fn create_request(
        &self,
        creator: &User,
        input: CreateRequest,
    ) -> ServiceResult<MaintenanceRequest> {
        if input.title.trim().is_empty()
            || input.description.trim().is_empty()
            || input.request_type.trim().is_empty()
            || input.category.trim().is_empty()
        {
            return Err(ServiceError::validation(
                "Title, description, type and category are required",
            ));
        }

        let request_type = RequestType::parse(input.request_type.trim()).ok_or_else(|| {
            ServiceError::validation(format!(
                "Unknown request type: {}",
                input.request_type.trim()
            ))
        })?;
        validate_images(&input.images)?;

        let draft = NewRequest {
            title: validate_title(&input.title)?,
            description: required_text(&input.description, "Description")?,
            request_type,
            category: required_text(&input.category, "Category")?,
            priority: input.priority.unwrap_or_default(),
            status: RequestStatus::New,
            location: input
                .location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            created_by: creator.id,
            images: input.images,
            external_id: None,
            source: RequestSource::Internal,
        };

        let request = self
            .requests
            .insert(&MaintenanceRequest::new(draft, Utc::now()))
            .await?;
        info!(
            "Maintenance request {} created by {} ({})",
            request.id, creator.id, request.request_type
        );
        Ok(request)
    }

    /// Fetch a request; hidden and missing requests are both `NotFound`
    pub async fn get_request(&self, actor: &User, id: Uuid) -> ServiceResult<MaintenanceRequest> {
        let request = self.find(id).await?;
        policy::ensure_visible(actor, &request)?;
        Ok(request)
    }

    pub async fn list_requests(
        &self,
        actor: &User,
        filter: &RequestFilter,
    ) -> ServiceResult<Page<MaintenanceRequest>> {
        let (items, total) = self
            .requests
            .list(Visibility::for_user(actor), filter)
            .await?;
        Ok(Page::new(items, total, filter))
    }

    pub async fn update_request(
        &self,
        actor: &User,
        id: Uuid,
        patch: RequestPatch,
    ) -> ServiceResult<MaintenanceRequest> {
        let current = self.find(id).await?;
        policy::ensure_can_update(actor, &current)?;

        if let Some(assignee) = patch.assigned_to {
            self.ensure_assignable(assignee).await?;
        }

        let changes = plan_update(actor, &current, patch, Utc::now())?;
        if changes.is_empty() {
            return Ok(current);
        }

        let updated = self
            .requests
            .update_fields(id, &changes)
            .await?
            .ok_or_else(|| ServiceError::not_found(REQUEST_NOT_FOUND))?;
        info!("Maintenance request {} updated by {}", id, actor.id);

        if updated.status != current.status {
            self.notify_user(
                updated.created_by,
                notify::status_message(&updated, current.status),
            )
            .await;
        }
        if let Some(assignee) = updated.assigned_to {
            if current.assigned_to != Some(assignee) {
                self.notify_user(assignee, notify::assignment_message(&updated))
                    .await;
            }
        }

        Ok(updated)
    }

    /// Append a comment and return the full comment list
    pub async fn add_comment(
        &self,
        actor: &User,
        id: Uuid,
        text: &str,
    ) -> ServiceResult<Vec<Comment>> {
        let text = required_text(text, "Comment text")?;
        let request = self.find(id).await?;
        policy::ensure_can_comment(actor, &request)?;

        let comment = Comment {
            text,
            created_by: actor.id,
            created_at: Utc::now(),
        };
        let updated = self
            .requests
            .append_comment(id, &comment)
            .await?
            .ok_or_else(|| ServiceError::not_found(REQUEST_NOT_FOUND))?;
        Ok(updated.comments)
    }

    /// Append a required part and return the full parts list
    pub async fn add_required_part(
        &self,
        actor: &User,
        id: Uuid,
        input: AddPart,
    ) -> ServiceResult<Vec<RequiredPart>> {
        let part_name = required_text(&input.part_name, "Part name")?;
        if input.quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }
        let quantity = u32::try_from(input.quantity)
            .map_err(|_| ServiceError::validation("Quantity is too large"))?;

        let request = self.find(id).await?;
        policy::ensure_visible(actor, &request)?;
        policy::ensure_can_add_part(actor, &request)?;

        let part = RequiredPart {
            part_name,
            quantity,
            available_in_stock: input.available_in_stock.unwrap_or(false),
            requested_at: Utc::now(),
        };
        let updated = self
            .requests
            .append_required_part(id, &part)
            .await?
            .ok_or_else(|| ServiceError::not_found(REQUEST_NOT_FOUND))?;
        Ok(updated.required_parts)
    }

    /// Overview counters over the requests visible to the caller
    pub async fn stats(&self, actor: &User) -> ServiceResult<RequestStats> {
        let counts = self
            .requests
            .count_by_status_and_type(Visibility::for_user(actor))
            .await?;
        Ok(summarize(&counts))
    }

    async fn find(&self, id: Uuid) -> ServiceResult<MaintenanceRequest> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(REQUEST_NOT_FOUND))
    }

    async fn ensure_assignable(&self, assignee: Uuid) -> ServiceResult<()> {
        match self.users.find_by_id(assignee).await? {
            Some(user) if user.is_active && user.role != Role::User => Ok(()),
            _ => Err(ServiceError::validation(
                "Assignee must be an active technician or administrator",
            )),
        }
    }

    async fn notify_user(&self, user_id: Uuid, (subject, body): (String, String)) {
        match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => notify::dispatch(self.notifier.clone(), user.email, subject, body),
            Ok(None) => warn!("Notification recipient {} no longer exists", user_id),
            Err(e) => warn!("Failed to look up notification recipient {}: {}", user_id, e),
        }
    }
}
