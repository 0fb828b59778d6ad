use axum::{Extension, Json, extract::State};
use tracing::{info, warn};

use tasker_db::UserRow;
use tasker_types::events::Notification;
use tasker_types::models::User;

use crate::allowlist::{Allowed, UserProfile};
use crate::auth::{AppState, run_blocking, user_write_error};
use crate::convert::user_model;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::validation;

/// GET /users/profile
pub async fn get_profile(Extension(session): Extension<Session>) -> Json<User> {
    Json(user_model(&session.user))
}

/// PATCH /users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Allowed { fields, body }: Allowed<UserProfile>,
) -> ApiResult<Json<User>> {
    let change =
        validation::profile_input(&session.user, &fields, body).map_err(ApiError::Validation)?;

    let current = session.user;
    let updated = run_blocking(&state, move |s| -> anyhow::Result<Option<UserRow>> {
        let password = s.credentials.hash_if_changed(change.password.as_deref(), &current.password)?;
        let row = UserRow {
            name: change.name,
            email: change.email,
            password,
            age: change.age,
            ..current
        };
        s.db.update_user(&row)
    })
    .await?
    .map_err(user_write_error)?
    .ok_or_else(|| ApiError::BadRequest("Unable to save user".into()))?;

    Ok(Json(user_model(&updated)))
}

/// DELETE /users/profile
///
/// Tasks and the user row (with its session set) go in one transaction. The
/// goodbye mail is only sent once both are gone.
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<User>> {
    let user = session.user;
    let user_id = user.id.clone();

    let removed = run_blocking(&state, move |s| s.db.delete_user_cascade(&user_id))
        .await?
        .map_err(ApiError::internal)?;

    let Some(tasks) = removed else {
        warn!("User {} was already deleted", user.id);
        return Err(ApiError::Internal);
    };
    info!("Removed user {} and {} tasks", user.id, tasks);

    state.notifier.notify(Notification::Goodbye {
        email: user.email.clone(),
        name: user.name.clone(),
    });

    Ok(Json(user_model(&user)))
}
