//! Authentication middleware for bearer token validation

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use domain::models::User;

use crate::{error::ApiError, state::AppState};

/// Authentication middleware
///
/// Tokens of deactivated or deleted accounts are rejected even before they expire.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let user: User = state.identity.verify_token(token).await?;

    // Insert the user into the request extensions
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
