//! User repository backed by PostgreSQL

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::UserRepository;
use crate::models::{NewUser, User, UserChanges};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, language, phone, \
                            department, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.email);

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, language, phone, department)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.language)
        .bind(&new_user.phone)
        .bind(&new_user.department)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn list(&self) -> DatabaseResult<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn list_active_technicians(&self) -> DatabaseResult<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE role = 'technician' AND is_active
            ORDER BY name ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                phone = COALESCE($5, phone),
                department = COALESCE($6, department),
                language = COALESCE($7, language),
                is_active = COALESCE($8, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.role)
        .bind(&changes.phone)
        .bind(&changes.department)
        .bind(changes.language)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting user: {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
