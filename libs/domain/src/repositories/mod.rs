//! Repositories for database operations
//!
//! The traits describe what the services need from persistence. `user` and
//! `maintenance` back them with sqlx, `memory` with in-process maps.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{
    Comment, MaintenanceRequest, NewUser, RequestChanges, RequestFilter, RequiredPart,
    StatusTypeCount, User, UserChanges,
};
use crate::policy::Visibility;

pub mod maintenance;
pub mod memory;
pub mod user;

pub use maintenance::PgMaintenanceRepository;
pub use memory::{InMemoryMaintenanceRepository, InMemoryUserRepository};
pub use user::PgUserRepository;

/// User persistence
///
/// `create` and `update` fail with `DatabaseError::UniqueViolation` when the
/// email is already taken.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    /// All users, newest first
    async fn list(&self) -> DatabaseResult<Vec<User>>;

    /// Active technicians ordered by name
    async fn list_active_technicians(&self) -> DatabaseResult<Vec<User>>;

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

/// Maintenance request persistence
///
/// Every mutation touches a single row and only the fields it names.
#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    /// Fails with `DatabaseError::UniqueViolation` on a duplicate external id
    async fn insert(&self, request: &MaintenanceRequest) -> DatabaseResult<MaintenanceRequest>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<MaintenanceRequest>>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> DatabaseResult<Option<MaintenanceRequest>>;

    /// One page of visible requests matching the filter, newest first, with the total count
    async fn list(
        &self,
        scope: Visibility,
        filter: &RequestFilter,
    ) -> DatabaseResult<(Vec<MaintenanceRequest>, i64)>;

    async fn update_fields(
        &self,
        id: Uuid,
        changes: &RequestChanges,
    ) -> DatabaseResult<Option<MaintenanceRequest>>;

    async fn append_comment(
        &self,
        id: Uuid,
        comment: &Comment,
    ) -> DatabaseResult<Option<MaintenanceRequest>>;

    async fn append_required_part(
        &self,
        id: Uuid,
        part: &RequiredPart,
    ) -> DatabaseResult<Option<MaintenanceRequest>>;

    /// Visible request counts grouped by status and type
    async fn count_by_status_and_type(
        &self,
        scope: Visibility,
    ) -> DatabaseResult<Vec<StatusTypeCount>>;

    /// Requests created by or assigned to the user
    async fn count_involving(&self, user_id: Uuid) -> DatabaseResult<i64>;
}
