//! Middleware for bearer token authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, routes::AuthError};

/// Resolve the bearer token to an active user and store it in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let user = state.identity.verify_token(token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
