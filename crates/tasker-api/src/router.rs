use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::avatar::{self, AVATAR_BODY_LIMIT};
use crate::middleware::require_auth;
use crate::{profile, tasks};

/// All routes of the service. Transport layers (CORS, tracing) are added by
/// the binary.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(auth::signup))
        .route("/users/login", post(auth::login))
        .route("/users/{id}/avatar", get(avatar::get_avatar));

    let protected_routes = Router::new()
        .route("/users/logout", post(auth::logout))
        .route("/users/logoutAll", post(auth::logout_all))
        .route(
            "/users/profile",
            get(profile::get_profile)
                .patch(profile::update_profile)
                .delete(profile::delete_profile),
        )
        .route(
            "/users/profile/avatar",
            post(avatar::upload_avatar)
                .delete(avatar::delete_avatar)
                .layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
