//! Identity and access
//!
//! Registration, login, token verification and account administration.
//! Passwords are stored as salted Argon2 hashes; hashing and verification run
//! on the blocking pool.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::jwt::JwtService;
use crate::models::{Language, NewUser, ProfileUpdate, PublicUser, Role, User, UserChanges};
use crate::policy;
use crate::repositories::{MaintenanceRepository, UserRepository};
use crate::validation::{validate_email, validate_name, validate_password};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_TOKEN: &str = "Invalid or expired token";
const INACTIVE_ACCOUNT: &str = "Account is deactivated. Please contact an administrator";
const USER_NOT_FOUND: &str = "User not found";

/// Registration payload
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

/// Issued token plus the public projection of its owner
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

/// Account created at startup when missing
#[derive(Debug, Clone)]
pub struct DefaultAccount {
    pub name: &'static str,
    pub email: &'static str,
    pub role: Role,
}

pub const DEFAULT_ACCOUNTS: [DefaultAccount; 3] = [
    DefaultAccount {
        name: "System Administrator",
        email: "admin@company.com",
        role: Role::Admin,
    },
    DefaultAccount {
        name: "Maintenance Technician",
        email: "technician@company.com",
        role: Role::Technician,
    },
    DefaultAccount {
        name: "Staff Member",
        email: "user@company.com",
        role: Role::User,
    },
];

/// Default-account seeding configuration
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub enabled: bool,
    pub password: String,
}

impl SeedConfig {
    /// Create a new SeedConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SEED_DEFAULT_ACCOUNTS`: create the default accounts (default: true)
    /// - `DEFAULT_ACCOUNT_PASSWORD`: their initial password (default: 123456)
    pub fn from_env() -> Self {
        let enabled = std::env::var("SEED_DEFAULT_ACCOUNTS")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let password = match std::env::var("DEFAULT_ACCOUNT_PASSWORD") {
            Ok(password) => password,
            Err(_) => {
                if enabled {
                    warn!("DEFAULT_ACCOUNT_PASSWORD not set, seeding with the built-in password");
                }
                "123456".to_string()
            }
        };

        Self { enabled, password }
    }
}

/// Identity service
#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    requests: Arc<dyn MaintenanceRepository>,
    jwt: JwtService,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        requests: Arc<dyn MaintenanceRepository>,
        jwt: JwtService,
    ) -> Self {
        Self {
            users,
            requests,
            jwt,
        }
    }

    /// Create an account and open a session for it
    pub async fn register(&self, registration: Registration) -> ServiceResult<AuthSession> {
        if registration.name.trim().is_empty()
            || registration.email.trim().is_empty()
            || registration.password.is_empty()
        {
            return Err(ServiceError::validation(
                "Name, email and password are required",
            ));
        }
        validate_name(&registration.name)?;
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        validate_password(&registration.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(registration.password).await?;
        let new_user = NewUser {
            name: registration.name.trim().to_string(),
            email,
            password_hash,
            role: registration.role.unwrap_or_default(),
            language: Language::default(),
            phone: registration.phone,
            department: registration.department,
        };

        let user = self.users.create(&new_user).await.map_err(|e| {
            if e.is_unique_violation() {
                ServiceError::Conflict("Email is already registered".to_string())
            } else {
                e.into()
            }
        })?;
        info!("Registered user {} with role {}", user.id, user.role);

        self.open_session(&user)
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::validation("Email and password are required"));
        }

        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| ServiceError::Auth(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(user.password_hash.clone(), password.to_string()).await? {
            return Err(ServiceError::Auth(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            return Err(ServiceError::Auth(INACTIVE_ACCOUNT.to_string()));
        }

        info!("User {} logged in", user.id);
        self.open_session(&user)
    }

    /// Resolve a bearer token to its active user
    pub async fn verify_token(&self, token: Option<&str>) -> ServiceResult<User> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Auth("Authentication token is missing".to_string()))?;

        let claims = self
            .jwt
            .validate_token(token)
            .map_err(|_| ServiceError::Auth(INVALID_TOKEN.to_string()))?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Auth(INVALID_TOKEN.to_string()))?;

        if !user.is_active {
            return Err(ServiceError::Auth(INACTIVE_ACCOUNT.to_string()));
        }

        Ok(user)
    }

    /// Capability check composed after `verify_token`
    pub fn require_role(&self, user: &User, allowed: &[Role]) -> ServiceResult<()> {
        policy::require_role(user, allowed)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        update: ProfileUpdate,
    ) -> ServiceResult<PublicUser> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        let updated = self
            .users
            .update(user.id, &update.into())
            .await?
            .ok_or_else(|| ServiceError::not_found(USER_NOT_FOUND))?;
        Ok(PublicUser::from(&updated))
    }

    pub async fn list_users(&self, actor: &User) -> ServiceResult<Vec<PublicUser>> {
        ensure_admin(actor)?;
        let users = self.users.list().await?;
        Ok(users.iter().map(PublicUser::from).collect())
    }

    pub async fn get_user(&self, actor: &User, id: Uuid) -> ServiceResult<PublicUser> {
        ensure_admin(actor)?;
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(USER_NOT_FOUND))?;
        Ok(PublicUser::from(&user))
    }

    pub async fn update_user(
        &self,
        actor: &User,
        id: Uuid,
        mut changes: UserChanges,
    ) -> ServiceResult<PublicUser> {
        ensure_admin(actor)?;
        if let Some(name) = &changes.name {
            validate_name(name)?;
        }
        if let Some(email) = changes.email.take() {
            let email = normalize_email(&email);
            validate_email(&email)?;
            changes.email = Some(email);
        }

        let updated = self
            .users
            .update(id, &changes)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    ServiceError::Conflict("Email is already registered".to_string())
                } else {
                    e.into()
                }
            })?
            .ok_or_else(|| ServiceError::not_found(USER_NOT_FOUND))?;

        info!("User {} updated by {}", updated.id, actor.id);
        Ok(PublicUser::from(&updated))
    }

    /// Activate or deactivate an account
    pub async fn set_active(
        &self,
        actor: &User,
        id: Uuid,
        is_active: bool,
    ) -> ServiceResult<PublicUser> {
        self.update_user(
            actor,
            id,
            UserChanges {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete an account that no request refers to
    pub async fn delete_user(&self, actor: &User, id: Uuid) -> ServiceResult<()> {
        ensure_admin(actor)?;
        if self.users.find_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found(USER_NOT_FOUND));
        }

        if self.requests.count_involving(id).await? > 0 {
            return Err(ServiceError::Conflict(
                "User is linked to maintenance requests and cannot be deleted".to_string(),
            ));
        }

        self.users.delete(id).await?;
        info!("User {} deleted by {}", id, actor.id);
        Ok(())
    }

    /// Active technicians, for assignment pickers
    pub async fn list_technicians(&self) -> ServiceResult<Vec<PublicUser>> {
        let technicians = self.users.list_active_technicians().await?;
        Ok(technicians.iter().map(PublicUser::from).collect())
    }

    /// Create each missing default account; returns how many were created
    ///
    /// Existing emails are left untouched, so repeated startups never duplicate.
    pub async fn seed_default_accounts(
        &self,
        accounts: &[DefaultAccount],
        password: &str,
    ) -> ServiceResult<usize> {
        let mut created = 0;
        for account in accounts {
            if self.users.find_by_email(account.email).await?.is_some() {
                continue;
            }

            let new_user = NewUser {
                name: account.name.to_string(),
                email: account.email.to_string(),
                password_hash: hash_password(password.to_string()).await?,
                role: account.role,
                language: Language::default(),
                phone: None,
                department: None,
            };

            match self.users.create(&new_user).await {
                Ok(user) => {
                    info!("Created default account: {}", user.email);
                    created += 1;
                }
                // Another instance seeded it first
                Err(e) if e.is_unique_violation() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }

    fn open_session(&self, user: &User) -> ServiceResult<AuthSession> {
        let token = self.jwt.generate_token(user)?;
        Ok(AuthSession {
            token,
            user: PublicUser::from(user),
        })
    }
}

fn ensure_admin(actor: &User) -> ServiceResult<()> {
    if policy::can_manage_users(actor) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(
            "You do not have permission to manage users",
        ))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: String) -> ServiceResult<String> {
    let hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
    })
    .await
    .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
    Ok(hash)
}

async fn verify_password(hash: String, password: String) -> ServiceResult<bool> {
    let matches = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))??;
    Ok(matches)
}
