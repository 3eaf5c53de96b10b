use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::SessionStore;
use tracing::Level;

// --- Module Structure ---

// Request pipeline stages and the state they manage.
pub mod auth;
pub mod csrf;
pub mod middleware;
pub mod session;

// Application services and components.
pub mod config;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod templates;
pub mod validator;

// Route groups (public pages, pages behind the login gate).
pub mod routes;
use routes::{protected, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use csrf::CsrfProtection;
pub use errors::{AppError, ModelError};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// AppState
///
/// The single container of services shared by every request: the record store, the CSRF
/// token provider, and the configuration. Built once at startup and injected into the
/// router; there is no ambient global state.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub csrf: CsrfProtection,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let csrf = CsrfProtection::new(config.csrf_secret.as_bytes());
        Self { repo, csrf, config }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CsrfProtection {
    fn from_ref(app_state: &AppState) -> CsrfProtection {
        app_state.csrf.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the whole request pipeline around the route table. From the outside in:
///
/// 1. panic recovery
/// 2. request id, access logging, request id propagation
/// 3. security headers
/// 4. request timeout
/// 5. router dispatch (unmatched paths 404, unsupported methods 405)
/// 6. dynamic group: session load-and-save, lifetime pinning, CSRF verification,
///    authentication
/// 7. protected group only: authorization gate
///
/// `/ping` and `/static` are dispatched without the dynamic group.
#[allow(deprecated)]
pub fn create_router<Store>(state: AppState, session_store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let x_request_id = HeaderName::from_static("x-request-id");

    // Later `route_layer` calls wrap the earlier ones, so the session layer ends up
    // outermost and the gate innermost.
    let dynamic = public::public_routes()
        .merge(
            protected::protected_routes()
                .route_layer(from_fn(auth::require_authentication)),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            csrf::verify_csrf,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            session::pin_lifetime,
        ))
        .route_layer(session::session_layer(session_store, &state.config));

    let mut router = Router::new()
        .route("/ping", get(handlers::ping))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .merge(dynamic)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .with_state(state);

    for header in middleware::security_header_layers() {
        router = router.layer(header);
    }

    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(middleware::recover_panic))
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(middleware::trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}
