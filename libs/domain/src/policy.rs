//! Role-based access rules for maintenance requests
//!
//! Every handler and service asks these functions instead of branching on
//! roles itself.

use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{MaintenanceRequest, Role, User};

const REQUEST_NOT_FOUND: &str = "Maintenance request not found";

/// Which requests a user may read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every request
    All,
    /// Requests created by or assigned to the user
    Involving(Uuid),
}

impl Visibility {
    pub fn for_user(user: &User) -> Self {
        match user.role {
            Role::Admin => Visibility::All,
            Role::Technician | Role::User => Visibility::Involving(user.id),
        }
    }

    pub fn admits(&self, request: &MaintenanceRequest) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Involving(user_id) => request.involves(*user_id),
        }
    }
}

pub fn can_view(user: &User, request: &MaintenanceRequest) -> bool {
    Visibility::for_user(user).admits(request)
}

/// Admins update anything, technicians only what is assigned to them
pub fn can_update(user: &User, request: &MaintenanceRequest) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Technician => request.assigned_to == Some(user.id),
        Role::User => false,
    }
}

/// Plain users comment on their own requests, staff on anything they can see
pub fn can_comment(user: &User, request: &MaintenanceRequest) -> bool {
    match user.role {
        Role::User => request.created_by == user.id,
        Role::Admin | Role::Technician => can_view(user, request),
    }
}

pub fn can_add_part(user: &User, request: &MaintenanceRequest) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Technician => request.assigned_to == Some(user.id),
        Role::User => false,
    }
}

/// Only admins may reclassify a request (type and category)
pub fn can_reclassify(user: &User) -> bool {
    user.is_admin()
}

pub fn can_manage_users(user: &User) -> bool {
    user.is_admin()
}

/// Fail with `NotFound` when the request is hidden from the user
pub fn ensure_visible(user: &User, request: &MaintenanceRequest) -> ServiceResult<()> {
    if can_view(user, request) {
        Ok(())
    } else {
        Err(ServiceError::not_found(REQUEST_NOT_FOUND))
    }
}

pub fn ensure_can_update(user: &User, request: &MaintenanceRequest) -> ServiceResult<()> {
    if can_update(user, request) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "You do not have permission to update this request",
        ))
    }
}

pub fn ensure_can_comment(user: &User, request: &MaintenanceRequest) -> ServiceResult<()> {
    ensure_visible(user, request)?;
    if can_comment(user, request) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "You do not have permission to comment on this request",
        ))
    }
}

pub fn ensure_can_add_part(user: &User, request: &MaintenanceRequest) -> ServiceResult<()> {
    if can_add_part(user, request) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "You do not have permission to add parts to this request",
        ))
    }
}

/// Fail with `Forbidden` unless the user's role is in `allowed`
pub fn require_role(user: &User, allowed: &[Role]) -> ServiceResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}
