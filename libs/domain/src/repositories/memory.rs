//! In-memory repositories
//!
//! Same contracts as the PostgreSQL repositories, including unique keys on
//! user email and request external id. Used by the test suites.

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MaintenanceRepository, UserRepository};
use crate::models::{
    Comment, MaintenanceRequest, NewUser, RequestChanges, RequestFilter, RequiredPart, Role,
    StatusTypeCount, User, UserChanges,
};
use crate::policy::Visibility;

/// User repository kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut users = self.users.write().await;
        if email_taken(&users, &new_user.email, None) {
            return Err(DatabaseError::UniqueViolation("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            is_active: true,
            language: new_user.language,
            phone: new_user.phone.clone(),
            department: new_user.department.clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self) -> DatabaseResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn list_active_technicians(&self) -> DatabaseResult<Vec<User>> {
        let mut technicians: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.role == Role::Technician && u.is_active)
            .cloned()
            .collect();
        technicians.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(technicians)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if email_taken(&users, email, Some(id)) {
                return Err(DatabaseError::UniqueViolation("users_email_key".to_string()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(phone) = &changes.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(department) = &changes.department {
            user.department = Some(department.clone());
        }
        if let Some(language) = changes.language {
            user.language = language;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

/// Maintenance request repository kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryMaintenanceRepository {
    requests: Arc<RwLock<HashMap<Uuid, MaintenanceRequest>>>,
}

impl InMemoryMaintenanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl MaintenanceRepository for InMemoryMaintenanceRepository {
    async fn insert(&self, request: &MaintenanceRequest) -> DatabaseResult<MaintenanceRequest> {
        let mut requests = self.requests.write().await;
        if let Some(external_id) = &request.external_id {
            if requests
                .values()
                .any(|r| r.external_id.as_ref() == Some(external_id))
            {
                return Err(DatabaseError::UniqueViolation(
                    "maintenance_requests_external_id_key".to_string(),
                ));
            }
        }
        requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<MaintenanceRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| r.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn list(
        &self,
        scope: Visibility,
        filter: &RequestFilter,
    ) -> DatabaseResult<(Vec<MaintenanceRequest>, i64)> {
        let mut matching: Vec<MaintenanceRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| scope.admits(r) && filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: &RequestChanges,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        let mut requests = self.requests.write().await;
        let Some(request) = requests.get_mut(&id) else {
            return Ok(None);
        };

        let mut changes = changes.clone();
        if request.completed_at.is_some() {
            changes.completed_at = None;
        }
        changes.apply_to(request, Utc::now());
        Ok(Some(request.clone()))
    }

    async fn append_comment(
        &self,
        id: Uuid,
        comment: &Comment,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        let mut requests = self.requests.write().await;
        Ok(requests.get_mut(&id).map(|request| {
            request.comments.push(comment.clone());
            request.updated_at = Utc::now();
            request.clone()
        }))
    }

    async fn append_required_part(
        &self,
        id: Uuid,
        part: &RequiredPart,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        let mut requests = self.requests.write().await;
        Ok(requests.get_mut(&id).map(|request| {
            request.required_parts.push(part.clone());
            request.updated_at = Utc::now();
            request.clone()
        }))
    }

    async fn count_by_status_and_type(
        &self,
        scope: Visibility,
    ) -> DatabaseResult<Vec<StatusTypeCount>> {
        let mut counts: HashMap<_, i64> = HashMap::new();
        for request in self.requests.read().await.values() {
            if scope.admits(request) {
                *counts
                    .entry((request.status, request.request_type))
                    .or_default() += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|((status, request_type), count)| StatusTypeCount {
                status,
                request_type,
                count,
            })
            .collect())
    }

    async fn count_involving(&self, user_id: Uuid) -> DatabaseResult<i64> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.involves(user_id))
            .count() as i64)
    }
}
