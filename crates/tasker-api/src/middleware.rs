use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use tasker_db::UserRow;

use crate::auth::{AppState, run_blocking};
use crate::credentials::AuthError;
use crate::error::ApiError;

/// The authenticated user plus the exact token presented, so single-session
/// logout knows which entry to drop.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserRow,
    pub token: String,
}

/// Resolve the bearer token to a live session and attach it to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or(ApiError::Unauthorized)?;

    let session = run_blocking(&state, move |s| s.credentials.verify_token(&s.db, &token))
        .await?
        .map_err(|e| match e {
            AuthError::Store(err) => ApiError::internal(err),
            _ => ApiError::Unauthorized,
        })?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
