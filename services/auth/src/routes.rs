//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::WithRejection;
use domain::{
    ServiceError,
    identity::Registration,
    models::{ProfileUpdate, PublicUser, Role, User},
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::{AppState, middleware::auth_middleware, rate_limiter::login_key};

/// JSON body extractor whose rejection renders as an `AuthError`
type ValidJson<T> = WithRejection<Json<T>, AuthError>;

/// Request for account registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Account registration endpoint
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = state
        .identity
        .register(Registration {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role: payload.role,
            phone: payload.phone,
            department: payload.department,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created",
            "token": session.token,
            "user": session.user,
        })),
    ))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    WithRejection(Json(payload), _): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let key = login_key(client.ip(), &payload.email);
    if state.rate_limiter.is_blocked(&key).await {
        return Err(AuthError::TooManyRequests);
    }

    let session = match state.identity.login(&payload.email, &payload.password).await {
        Ok(session) => session,
        Err(err) => {
            if matches!(err, ServiceError::Auth(_)) {
                state.rate_limiter.record_failure(&key).await;
            }
            return Err(err.into());
        }
    };
    state.rate_limiter.reset(&key).await;
    info!("Issued session token for user {}", session.user.id);

    Ok(Json(json!({
        "success": true,
        "message": "Logged in",
        "token": session.token,
        "user": session.user,
    })))
}

/// Current user endpoint
pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "user": PublicUser::from(&user),
    }))
}

/// Profile update endpoint
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(payload), _): ValidJson<ProfileUpdate>,
) -> Result<impl IntoResponse, AuthError> {
    let updated = state.identity.update_profile(&user, payload).await?;

    Ok(Json(json!({
        "success": true,
        "user": updated,
    })))
}

/// Custom error type for authentication errors
#[derive(Debug)]
pub enum AuthError {
    Service(ServiceError),
    TooManyRequests,
}

impl From<ServiceError> for AuthError {
    fn from(err: ServiceError) -> Self {
        AuthError::Service(err)
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Service(ServiceError::validation(rejection.body_text()))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts, please try again later".to_string(),
            ),
            AuthError::Service(err) => {
                let status = match &err {
                    ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                    ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
                    ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::Conflict(_) => StatusCode::CONFLICT,
                    ServiceError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                    ServiceError::Database(_) | ServiceError::Internal(_) => {
                        error!("Request failed: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.public_message())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
    use axum::body::{Body, to_bytes};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, header};
    use domain::identity::IdentityService;
    use domain::jwt::{DEFAULT_TOKEN_EXPIRY, JwtConfig, JwtService};
    use domain::repositories::{InMemoryMaintenanceRepository, InMemoryUserRepository};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let jwt = JwtService::new(JwtConfig {
            secret: "router-test-secret".to_string(),
            token_expiry: DEFAULT_TOKEN_EXPIRY,
        });
        let identity = IdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryMaintenanceRepository::new()),
            jwt,
        );
        create_router(AppState {
            identity,
            rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        })
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn login_from(client: [u8; 4], email: &str, password: &str) -> Request<Body> {
        let mut request = post_json(
            "/auth/login",
            json!({"email": email, "password": password}),
        );
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((client, 50000))));
        request
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            post_json(
                "/auth/register",
                json!({"name": "Omar", "email": email, "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health() {
        let (status, body) = call(
            &app(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_then_me() {
        let app = app();
        let token = register(&app, "omar@company.com").await;

        let (status, body) = call(&app, get_with_token("/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "omar@company.com");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn register_errors_map_to_status() {
        let app = app();
        register(&app, "omar@company.com").await;

        let (status, body) = call(
            &app,
            post_json(
                "/auth/register",
                json!({"name": "Omar", "email": "omar@company.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = call(
            &app,
            post_json(
                "/auth/register",
                json!({"name": "Omar", "email": "short@company.com", "password": "123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_and_enumeration_safe_errors() {
        let app = app();
        register(&app, "omar@company.com").await;

        let (status, body) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "omar@company.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());

        let (status, wrong) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "omar@company.com", "password": "secret2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, unknown) = call(
            &app,
            post_json(
                "/auth/login",
                json!({"email": "ghost@company.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong["error"], unknown["error"]);
    }

    #[tokio::test]
    async fn repeated_failed_logins_are_throttled() {
        let app = app();
        let attempt = || {
            post_json(
                "/auth/login",
                json!({"email": "ghost@company.com", "password": "nope-nope"}),
            )
        };

        for _ in 0..5 {
            let (status, _) = call(&app, attempt()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _) = call(&app, attempt()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn throttling_one_client_leaves_others_alone() {
        let app = app();
        register(&app, "victim@company.com").await;

        for _ in 0..5 {
            let (status, _) = call(
                &app,
                login_from([10, 0, 0, 1], "victim@company.com", "guess-guess"),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, body) = call(
            &app,
            login_from([10, 0, 0, 1], "victim@company.com", "secret1"),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["success"], false);

        let (status, body) = call(
            &app,
            login_from([10, 0, 0, 2], "victim@company.com", "secret1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn successful_login_clears_failures() {
        let app = app();
        register(&app, "omar@company.com").await;
        let client = [10, 0, 0, 3];

        for _ in 0..4 {
            call(&app, login_from(client, "omar@company.com", "wrong-one")).await;
        }
        let (status, _) = call(&app, login_from(client, "omar@company.com", "secret1")).await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..4 {
            call(&app, login_from(client, "omar@company.com", "wrong-one")).await;
        }
        let (status, _) = call(&app, login_from(client, "omar@company.com", "secret1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = app();
        let (status, body) = call(
            &app,
            post_json(
                "/auth/register",
                json!({
                    "name": "Omar",
                    "email": "omar@company.com",
                    "password": "secret1",
                    "role": "superuser"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("role"));
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = app();
        let (status, body) = call(
            &app,
            Request::get("/auth/me").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, get_with_token("/auth/me", "not-a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_update() {
        let app = app();
        let token = register(&app, "omar@company.com").await;

        let request = Request::put("/auth/profile")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"department": "Finance", "language": "en"}).to_string(),
            ))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["department"], "Finance");
        assert_eq!(body["user"]["language"], "en");
    }
}
