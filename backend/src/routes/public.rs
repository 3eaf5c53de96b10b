use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Pages any visitor may load. Signup and login live here because they are how an
/// anonymous visitor becomes authenticated. Their POST forms are still covered by CSRF
/// verification, which the dynamic group applies above this router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // The latest snippets.
        .route("/", get(handlers::home))
        .route("/about", get(handlers::about))
        // GET /snippet/view/{id}
        // The id is parsed by the handler so that malformed ids are a 404, not a 400.
        .route("/snippet/view/{id}", get(handlers::snippet_view))
        .route(
            "/user/signup",
            get(handlers::user_signup).post(handlers::user_signup_post),
        )
        // POST /user/login
        // Rotates the session id before recording the user id.
        .route(
            "/user/login",
            get(handlers::user_login).post(handlers::user_login_post),
        )
}
