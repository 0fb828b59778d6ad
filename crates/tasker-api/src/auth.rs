use std::sync::Arc;

use axum::{Extension, Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info, warn};
use uuid::Uuid;

use tasker_db::Database;
use tasker_types::api::{AuthResponse, LoginRequest, MessageResponse};
use tasker_types::events::Notification;

use crate::allowlist::{Allowed, UserProfile};
use crate::convert::user_model;
use crate::credentials::CredentialManager;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::notify::Notifier;
use crate::validation;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: CredentialManager,
    pub notifier: Arc<dyn Notifier>,
}

/// Runs store and CPU-heavy work off the async runtime. The outer error is
/// only a join failure; the inner result is left for the caller to map.
pub(crate) async fn run_blocking<F, T, E>(state: &AppState, f: F) -> Result<Result<T, E>, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })
}

/// Maps a failed user write to a 400, naming the duplicate email case.
pub(crate) fn user_write_error(err: anyhow::Error) -> ApiError {
    if tasker_db::is_unique_violation(&err) {
        return ApiError::BadRequest("Email is already registered".into());
    }
    warn!("User write failed: {}", err);
    ApiError::BadRequest("Unable to save user".into())
}

/// POST /users
pub async fn signup(
    State(state): State<AppState>,
    Allowed { body, .. }: Allowed<UserProfile>,
) -> ApiResult<impl IntoResponse> {
    let input = validation::signup_input(body).map_err(ApiError::Validation)?;

    let user_id = Uuid::new_v4().to_string();
    let user = run_blocking(&state, move |s| -> anyhow::Result<_> {
        let hash = s.credentials.hash_password(&input.password)?;
        s.db.create_user(&user_id, &input.name, &input.email, &hash, input.age)
    })
    .await?
    .map_err(user_write_error)?;

    info!("User {} signed up", user.id);
    state.notifier.notify(Notification::Welcome {
        email: user.email.clone(),
        name: user.name.clone(),
    });

    let id = user.id.clone();
    let token = run_blocking(&state, move |s| s.credentials.issue_token(&s.db, &id))
        .await?
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_model(&user),
            token,
        }),
    ))
}

/// POST /users/login. Every failure looks the same to the caller.
pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<AuthResponse>> {
    let unable = || ApiError::BadRequest("Unable to login".into());

    let req: LoginRequest = serde_json::from_slice(&body).map_err(|_| unable())?;

    let (user, token) = run_blocking(&state, move |s| -> anyhow::Result<_> {
        let user = s.credentials.verify_credentials(&s.db, &req.email, &req.password)?;
        let token = s.credentials.issue_token(&s.db, &user.id)?;
        Ok((user, token))
    })
    .await?
    .map_err(|e| {
        warn!("Login rejected: {}", e);
        unable()
    })?;

    Ok(Json(AuthResponse {
        user: user_model(&user),
        token,
    }))
}

/// POST /users/logout. Drops only the token used for this request.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MessageResponse>> {
    run_blocking(&state, move |s| {
        s.credentials.revoke_token(&s.db, &session.user.id, &session.token)
    })
    .await?
    .map_err(ApiError::internal)?;

    Ok(Json(MessageResponse::new("Logout successful!")))
}

/// POST /users/logoutAll
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MessageResponse>> {
    let revoked = run_blocking(&state, move |s| {
        s.credentials.revoke_all_tokens(&s.db, &session.user.id)
    })
    .await?
    .map_err(ApiError::internal)?;

    info!("Revoked {} sessions", revoked);
    Ok(Json(MessageResponse::new("Logout successful!")))
}
