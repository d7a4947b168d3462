//! Maintenance request repository backed by PostgreSQL
//!
//! Comments and required parts live in JSONB arrays on the request row, so
//! appending one is a single-row update.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::MaintenanceRepository;
use crate::models::{
    Comment, MaintenanceRequest, RequestChanges, RequestFilter, RequiredPart, StatusTypeCount,
};
use crate::policy::Visibility;

/// Maintenance request repository
#[derive(Clone)]
pub struct PgMaintenanceRepository {
    pool: PgPool,
}

impl PgMaintenanceRepository {
    /// Create a new maintenance request repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: Visibility) {
    if let Visibility::Involving(user_id) = scope {
        builder
            .push(" AND (created_by = ")
            .push_bind(user_id)
            .push(" OR assigned_to = ")
            .push_bind(user_id)
            .push(")");
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &RequestFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(request_type) = filter.request_type {
        builder.push(" AND request_type = ").push_bind(request_type);
    }
}

#[async_trait]
impl MaintenanceRepository for PgMaintenanceRepository {
    async fn insert(&self, request: &MaintenanceRequest) -> DatabaseResult<MaintenanceRequest> {
        sqlx::query_as::<_, MaintenanceRequest>(
            r#"
            INSERT INTO maintenance_requests (
                id, title, description, request_type, category, priority, status, location,
                created_by, assigned_to, images, comments, required_parts, completed_at,
                estimated_hours, actual_hours, external_id, source, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.request_type)
        .bind(&request.category)
        .bind(request.priority)
        .bind(request.status)
        .bind(&request.location)
        .bind(request.created_by)
        .bind(request.assigned_to)
        .bind(&request.images)
        .bind(Json(&request.comments))
        .bind(Json(&request.required_parts))
        .bind(request.completed_at)
        .bind(request.estimated_hours)
        .bind(request.actual_hours)
        .bind(&request.external_id)
        .bind(request.source)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<MaintenanceRequest>> {
        sqlx::query_as::<_, MaintenanceRequest>(
            "SELECT * FROM maintenance_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        sqlx::query_as::<_, MaintenanceRequest>(
            "SELECT * FROM maintenance_requests WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn list(
        &self,
        scope: Visibility,
        filter: &RequestFilter,
    ) -> DatabaseResult<(Vec<MaintenanceRequest>, i64)> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM maintenance_requests WHERE TRUE");
        push_scope(&mut query, scope);
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit() as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let items = query
            .build_query_as::<MaintenanceRequest>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM maintenance_requests WHERE TRUE",
        );
        push_scope(&mut count, scope);
        push_filter(&mut count, filter);

        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok((items, total))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: &RequestChanges,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        let mut query =
            QueryBuilder::<Postgres>::new("UPDATE maintenance_requests SET updated_at = now()");

        if let Some(title) = &changes.title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(description) = &changes.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(request_type) = changes.request_type {
            query.push(", request_type = ").push_bind(request_type);
        }
        if let Some(category) = &changes.category {
            query.push(", category = ").push_bind(category);
        }
        if let Some(priority) = changes.priority {
            query.push(", priority = ").push_bind(priority);
        }
        if let Some(status) = changes.status {
            query.push(", status = ").push_bind(status);
        }
        if let Some(assignee) = changes.assigned_to {
            query.push(", assigned_to = ").push_bind(assignee);
        }
        if let Some(location) = &changes.location {
            query.push(", location = ").push_bind(location);
        }
        if let Some(hours) = changes.estimated_hours {
            query.push(", estimated_hours = ").push_bind(hours);
        }
        if let Some(hours) = changes.actual_hours {
            query.push(", actual_hours = ").push_bind(hours);
        }
        if let Some(completed_at) = changes.completed_at {
            // One-shot: a stamp already present is kept
            query
                .push(", completed_at = COALESCE(completed_at, ")
                .push_bind(completed_at)
                .push(")");
        }

        query.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        query
            .build_query_as::<MaintenanceRequest>()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)
    }

    async fn append_comment(
        &self,
        id: Uuid,
        comment: &Comment,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        sqlx::query_as::<_, MaintenanceRequest>(
            r#"
            UPDATE maintenance_requests
            SET comments = comments || $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json([comment]))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn append_required_part(
        &self,
        id: Uuid,
        part: &RequiredPart,
    ) -> DatabaseResult<Option<MaintenanceRequest>> {
        sqlx::query_as::<_, MaintenanceRequest>(
            r#"
            UPDATE maintenance_requests
            SET required_parts = required_parts || $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json([part]))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn count_by_status_and_type(
        &self,
        scope: Visibility,
    ) -> DatabaseResult<Vec<StatusTypeCount>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT status, request_type, COUNT(*) AS count FROM maintenance_requests WHERE TRUE",
        );
        push_scope(&mut query, scope);
        query.push(" GROUP BY status, request_type");

        query
            .build_query_as::<StatusTypeCount>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)
    }

    async fn count_involving(&self, user_id: Uuid) -> DatabaseResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM maintenance_requests WHERE created_by = $1 OR assigned_to = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }
}
