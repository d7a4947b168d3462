//! Request lifecycle
//!
//! States run `new` → `in_progress` → `completed` | `cancelled`. Any state may
//! be set by an authorized update; the only side effect of a transition is the
//! completion stamp. `completed_at` is written the first time a request enters
//! `completed` and never again: reopening keeps it, completing a second time
//! does not refresh it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    MaintenanceRequest, RequestChanges, RequestPatch, RequestStats, RequestStatus,
    StatusTypeCount, TypeCount, User,
};
use crate::policy;
use crate::validation::{required_text, validate_hours, validate_title};

/// Completion stamp produced by moving `current` into `next`, if any
pub fn completion_stamp(
    current: &MaintenanceRequest,
    next: RequestStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let entering_completed =
        next == RequestStatus::Completed && current.status != RequestStatus::Completed;
    (entering_completed && current.completed_at.is_none()).then_some(now)
}

/// Validate a caller's patch and turn it into the field changes to persist
///
/// Reclassification (type and category) is reserved to admins; other roles
/// get `Forbidden` when they try it. Assignee existence is checked by the caller.
pub fn plan_update(
    actor: &User,
    current: &MaintenanceRequest,
    patch: RequestPatch,
    now: DateTime<Utc>,
) -> ServiceResult<RequestChanges> {
    if (patch.request_type.is_some() || patch.category.is_some()) && !policy::can_reclassify(actor)
    {
        return Err(ServiceError::forbidden(
            "Only administrators may change the type or category of a request",
        ));
    }

    let title = patch.title.as_deref().map(validate_title).transpose()?;
    let description = patch
        .description
        .as_deref()
        .map(|d| required_text(d, "Description"))
        .transpose()?;
    let category = patch
        .category
        .as_deref()
        .map(|c| required_text(c, "Category"))
        .transpose()?;
    if let Some(hours) = patch.estimated_hours {
        validate_hours(hours, "Estimated hours")?;
    }
    if let Some(hours) = patch.actual_hours {
        validate_hours(hours, "Actual hours")?;
    }

    let completed_at = patch
        .status
        .and_then(|status| completion_stamp(current, status, now));

    Ok(RequestChanges {
        title,
        description,
        request_type: patch.request_type,
        category,
        priority: patch.priority,
        status: patch.status,
        assigned_to: patch.assigned_to,
        location: patch.location.map(|l| l.trim().to_string()),
        estimated_hours: patch.estimated_hours,
        actual_hours: patch.actual_hours,
        completed_at,
    })
}

/// Fold grouped counts into the overview counters
pub fn summarize(counts: &[StatusTypeCount]) -> RequestStats {
    let mut stats = RequestStats::default();
    let mut by_type = HashMap::new();

    for row in counts {
        stats.total += row.count;
        match row.status {
            RequestStatus::New => stats.new += row.count,
            RequestStatus::InProgress => stats.in_progress += row.count,
            RequestStatus::Completed => stats.completed += row.count,
            RequestStatus::Cancelled => {}
        }
        *by_type.entry(row.request_type).or_insert(0) += row.count;
    }

    let mut type_stats: Vec<TypeCount> = by_type
        .into_iter()
        .map(|(request_type, count)| TypeCount {
            request_type,
            count,
        })
        .collect();
    type_stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.request_type.as_str().cmp(b.request_type.as_str()))
    });
    stats.type_stats = type_stats;

    stats
}
