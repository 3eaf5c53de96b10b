use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Protected Router Module
///
/// Pages that only make sense for a signed-in user. The authorization gate layered on top
/// of this router redirects anonymous requests to the login page and remembers where
/// they were headed, so handlers here can rely on the `AuthUser` extractor.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/snippet/create",
            get(handlers::snippet_create).post(handlers::snippet_create_post),
        )
        // POST /user/logout
        // Rotates the session id before dropping the user id.
        .route("/user/logout", post(handlers::user_logout_post))
        .route("/account/view", get(handlers::account_view))
        .route(
            "/account/password/update",
            get(handlers::account_password_update).post(handlers::account_password_update_post),
        )
}
