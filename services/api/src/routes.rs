//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use domain::{
    maintenance::{AddPart, CreateRequest},
    models::{RequestFilter, RequestPatch, Role, User, UserChanges},
    policy,
    sync::{SyncResult, TicketSyncer},
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, ValidJson, ValidPath, ValidQuery},
    middleware::auth_middleware,
    models::{CommentRequest, RequestView, UserStatusRequest},
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/maintenance",
            post(create_request).get(list_requests),
        )
        .route("/maintenance/stats/overview", get(request_stats))
        .route(
            "/maintenance/:id",
            get(get_request).put(update_request),
        )
        .route("/maintenance/:id/comments", post(add_comment))
        .route("/maintenance/:id/required-parts", post(add_required_part))
        .route("/users", get(list_users))
        .route("/users/role/technicians", get(list_technicians))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/status", patch(set_user_status))
        .route("/sync/freshservice", post(sync_all_tickets))
        .route("/sync/freshservice/:ticket_id", post(sync_ticket))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Create a maintenance request
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(payload), _): ValidJson<CreateRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.maintenance.create_request(&user, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Maintenance request created",
            "data": RequestView::at(request, Utc::now()),
        })),
    ))
}

/// List the maintenance requests visible to the caller
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Query(filter), _): ValidQuery<RequestFilter>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let page = state
        .maintenance
        .list_requests(&user, &filter)
        .await?
        .map(|request| RequestView::at(request, now));

    Ok(Json(json!({
        "success": true,
        "data": page,
    })))
}

/// Get a maintenance request by ID
pub async fn get_request(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let request = state.maintenance.get_request(&user, id).await?;

    Ok(Json(json!({
        "success": true,
        "data": RequestView::at(request, Utc::now()),
    })))
}

/// Update a maintenance request
pub async fn update_request(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
    WithRejection(Json(payload), _): ValidJson<RequestPatch>,
) -> ApiResult<impl IntoResponse> {
    let request = state.maintenance.update_request(&user, id, payload).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Maintenance request updated",
        "data": RequestView::at(request, Utc::now()),
    })))
}

/// Add a comment to a maintenance request
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
    WithRejection(Json(payload), _): ValidJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comments = state.maintenance.add_comment(&user, id, &payload.text).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": comments,
        })),
    ))
}

/// Add a required part to a maintenance request
pub async fn add_required_part(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
    WithRejection(Json(payload), _): ValidJson<AddPart>,
) -> ApiResult<impl IntoResponse> {
    let parts = state
        .maintenance
        .add_required_part(&user, id, payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": parts,
        })),
    ))
}

/// Overview counters of the requests visible to the caller
pub async fn request_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let stats = state.maintenance.stats(&user).await?;

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}

/// Get all users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let users = state.identity.list_users(&user).await?;

    Ok(Json(json!({
        "success": true,
        "data": users,
    })))
}

/// Get active technicians
pub async fn list_technicians(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let technicians = state.identity.list_technicians().await?;

    Ok(Json(json!({
        "success": true,
        "data": technicians,
    })))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let found = state.identity.get_user(&user, id).await?;

    Ok(Json(json!({
        "success": true,
        "data": found,
    })))
}

/// Update a user
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
    WithRejection(Json(payload), _): ValidJson<UserChanges>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.identity.update_user(&user, id, payload).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated",
        "data": updated,
    })))
}

/// Activate or deactivate a user
pub async fn set_user_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
    WithRejection(Json(payload), _): ValidJson<UserStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let updated = state
        .identity
        .set_active(&user, id, payload.is_active)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": updated,
    })))
}

/// Delete a user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): ValidPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.identity.delete_user(&user, id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted",
    })))
}

/// Sync one helpdesk ticket into the request store
pub async fn sync_ticket(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(ticket_id), _): ValidPath<u64>,
) -> ApiResult<Response> {
    let syncer = admin_syncer(&state, &user)?;
    info!("Sync of ticket {} requested by {}", ticket_id, user.id);

    let response = match syncer.sync_ticket_within(ticket_id, state.sync_timeout).await {
        SyncResult::Synced { action, request } => Json(json!({
            "success": true,
            "action": action,
            "data": RequestView::at(request, Utc::now()),
        }))
        .into_response(),
        SyncResult::Failed { error, retryable } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "error": error,
                "retryable": retryable,
            })),
        )
            .into_response(),
    };

    Ok(response)
}

/// Sync every ticket listed by the helpdesk
pub async fn sync_all_tickets(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Response> {
    let syncer = admin_syncer(&state, &user)?;
    info!("Bulk sync requested by {}", user.id);

    let response = match syncer.sync_tickets().await {
        Ok(report) => Json(json!({
            "success": true,
            "data": report,
        }))
        .into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "error": err.to_string(),
                "retryable": err.is_retryable(),
            })),
        )
            .into_response(),
    };

    Ok(response)
}

fn admin_syncer<'a>(state: &'a AppState, user: &User) -> ApiResult<&'a TicketSyncer> {
    policy::require_role(user, &[Role::Admin])?;
    state.syncer.as_ref().ok_or(ApiError::SyncDisabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use domain::identity::IdentityService;
    use domain::jwt::{DEFAULT_TOKEN_EXPIRY, JwtConfig, JwtService};
    use domain::maintenance::MaintenanceService;
    use domain::models::{Language, NewUser};
    use domain::notify::LogNotifier;
    use domain::repositories::{
        InMemoryMaintenanceRepository, InMemoryUserRepository, UserRepository,
    };
    use domain::sync::{ExternalTicket, HelpdeskClient, HelpdeskError};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct OneTicket;

    #[async_trait]
    impl HelpdeskClient for OneTicket {
        async fn get_ticket(&self, ticket_id: u64) -> Result<ExternalTicket, HelpdeskError> {
            if ticket_id != 77 {
                return Err(HelpdeskError::Rejected {
                    status: 404,
                    body: "not found".to_string(),
                });
            }
            Ok(ExternalTicket {
                id: 77,
                subject: Some("Generator will not start".to_string()),
                category: Some("Generator".to_string()),
                priority: Some(1),
                status: Some(2),
                ..Default::default()
            })
        }

        async fn list_tickets(&self) -> Result<Vec<ExternalTicket>, HelpdeskError> {
            Ok(vec![self.get_ticket(77).await?])
        }
    }

    struct TestApp {
        router: Router,
        users: InMemoryUserRepository,
        jwt: JwtService,
    }

    impl TestApp {
        fn new() -> Self {
            let users = InMemoryUserRepository::new();
            let requests = InMemoryMaintenanceRepository::new();
            let jwt = JwtService::new(JwtConfig {
                secret: "api-test-secret".to_string(),
                token_expiry: DEFAULT_TOKEN_EXPIRY,
            });

            let state = AppState {
                identity: IdentityService::new(
                    Arc::new(users.clone()),
                    Arc::new(requests.clone()),
                    jwt.clone(),
                ),
                maintenance: MaintenanceService::new(
                    Arc::new(requests.clone()),
                    Arc::new(users.clone()),
                    Arc::new(LogNotifier),
                ),
                syncer: Some(TicketSyncer::new(
                    Arc::new(OneTicket),
                    Arc::new(requests),
                    Uuid::new_v4(),
                )),
                sync_timeout: Duration::from_secs(5),
            };

            Self {
                router: create_router(state),
                users,
                jwt,
            }
        }

        async fn user(&self, email: &str, role: Role) -> (User, String) {
            let user = self
                .users
                .create(&NewUser {
                    name: email.to_string(),
                    email: email.to_string(),
                    password_hash: "unused".to_string(),
                    role,
                    language: Language::En,
                    phone: None,
                    department: None,
                })
                .await
                .unwrap();
            let token = self.jwt.generate_token(&user).unwrap();
            (user, token)
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token));
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    fn ac_request() -> Value {
        json!({
            "title": "AC not cooling",
            "description": "Unit 3 broken",
            "type": "ac",
            "category": "cooling",
            "priority": "high"
        })
    }

    #[tokio::test]
    async fn request_lifecycle_over_http() {
        let app = TestApp::new();
        let (owner, owner_token) = app.user("u@company.com", Role::User).await;
        let (_, admin_token) = app.user("admin@company.com", Role::Admin).await;
        let (_, stranger_token) = app.user("x@company.com", Role::User).await;

        let (status, body) = app
            .call("POST", "/maintenance", &owner_token, Some(ac_request()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "new");
        assert_eq!(body["data"]["createdBy"], owner.id.to_string());
        assert!(body["data"]["completedAt"].is_null());
        assert_eq!(body["data"]["ageInDays"], 0);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                "PUT",
                &format!("/maintenance/{}", id),
                &admin_token,
                Some(json!({"status": "completed"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["completedAt"].is_string());
        assert_eq!(body["data"]["type"], "ac");
        assert_eq!(body["data"]["priority"], "high");

        let (status, _) = app
            .call("GET", &format!("/maintenance/{}", id), &owner_token, None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .call("GET", &format!("/maintenance/{}", id), &stranger_token, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn listing_is_scoped_and_paginated() {
        let app = TestApp::new();
        let (_, owner_token) = app.user("u@company.com", Role::User).await;
        let (_, other_token) = app.user("o@company.com", Role::User).await;
        let (_, admin_token) = app.user("admin@company.com", Role::Admin).await;

        for _ in 0..3 {
            app.call("POST", "/maintenance", &owner_token, Some(ac_request()))
                .await;
        }
        app.call("POST", "/maintenance", &other_token, Some(ac_request()))
            .await;

        let (_, body) = app
            .call("GET", "/maintenance?limit=2&page=1", &owner_token, None)
            .await;
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["totalPages"], 2);
        assert_eq!(body["data"]["requests"].as_array().unwrap().len(), 2);

        let (_, body) = app
            .call("GET", "/maintenance?status=new", &admin_token, None)
            .await;
        assert_eq!(body["data"]["total"], 4);

        let (_, body) = app
            .call("GET", "/maintenance/stats/overview", &other_token, None)
            .await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["typeStats"][0]["type"], "ac");
    }

    #[tokio::test]
    async fn comments_and_parts_follow_policy() {
        let app = TestApp::new();
        let (_, owner_token) = app.user("u@company.com", Role::User).await;
        let (tech, tech_token) = app.user("t@company.com", Role::Technician).await;
        let (_, admin_token) = app.user("admin@company.com", Role::Admin).await;

        let (_, body) = app
            .call("POST", "/maintenance", &owner_token, Some(ac_request()))
            .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                "POST",
                &format!("/maintenance/{}/comments", id),
                &owner_token,
                Some(json!({"text": "Please hurry"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"][0]["text"], "Please hurry");

        let (status, _) = app
            .call(
                "POST",
                &format!("/maintenance/{}/required-parts", id),
                &owner_token,
                Some(json!({"partName": "Filter", "quantity": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(
                "PUT",
                &format!("/maintenance/{}", id),
                &tech_token,
                Some(json!({"status": "in_progress"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        app.call(
            "PUT",
            &format!("/maintenance/{}", id),
            &admin_token,
            Some(json!({"assignedTo": tech.id})),
        )
        .await;

        let (status, body) = app
            .call(
                "POST",
                &format!("/maintenance/{}/required-parts", id),
                &tech_token,
                Some(json!({"partName": "Filter", "quantity": 2, "availableInStock": true})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"][0]["quantity"], 2);

        let (status, _) = app
            .call(
                "POST",
                &format!("/maintenance/{}/required-parts", id),
                &tech_token,
                Some(json!({"partName": "Filter", "quantity": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_administration_requires_admin() {
        let app = TestApp::new();
        let (plain, plain_token) = app.user("u@company.com", Role::User).await;
        let (_, admin_token) = app.user("admin@company.com", Role::Admin).await;
        app.user("t@company.com", Role::Technician).await;

        let (status, _) = app.call("GET", "/users", &plain_token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.call("GET", "/users", &admin_token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (_, body) = app
            .call("GET", "/users/role/technicians", &plain_token, None)
            .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .call(
                "PATCH",
                &format!("/users/{}/status", plain.id),
                &admin_token,
                Some(json!({"isActive": false})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isActive"], false);

        // The deactivated account's token stops working
        let (status, _) = app
            .call("GET", "/maintenance", &plain_token, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .call("DELETE", &format!("/users/{}", plain.id), &admin_token, None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call("GET", &format!("/users/{}", plain.id), &admin_token, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_endpoints() {
        let app = TestApp::new();
        let (_, admin_token) = app.user("admin@company.com", Role::Admin).await;
        let (_, tech_token) = app.user("t@company.com", Role::Technician).await;

        let (status, _) = app
            .call("POST", "/sync/freshservice/77", &tech_token, None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call("POST", "/sync/freshservice/77", &admin_token, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "created");
        assert_eq!(body["data"]["type"], "generator");
        assert_eq!(body["data"]["priority"], "critical");
        assert_eq!(body["data"]["source"], "external");

        let (_, body) = app
            .call("POST", "/sync/freshservice/77", &admin_token, None)
            .await;
        assert_eq!(body["action"], "updated");

        let (status, body) = app
            .call("POST", "/sync/freshservice/12", &admin_token, None)
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["retryable"], false);

        let (status, body) = app
            .call("POST", "/sync/freshservice", &admin_token, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["updated"], 1);
        assert_eq!(body["data"]["created"], 0);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/maintenance").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_input_is_a_validation_error() {
        let app = TestApp::new();
        let (_, token) = app.user("u@company.com", Role::User).await;

        let mut unknown_priority = ac_request();
        unknown_priority["priority"] = json!("urgent");
        let (status, body) = app
            .call("POST", "/maintenance", &token, Some(unknown_priority))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("priority"));

        let (_, created) = app
            .call("POST", "/maintenance", &token, Some(ac_request()))
            .await;
        let id = created["data"]["id"].as_str().unwrap().to_string();
        let (status, body) = app
            .call(
                "PUT",
                &format!("/maintenance/{}", id),
                &token,
                Some(json!({"status": "paused"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = app
            .call("GET", "/maintenance?status=bogus", &token, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = app
            .call("GET", "/maintenance/not-a-uuid", &token, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
