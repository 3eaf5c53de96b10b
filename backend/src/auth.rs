use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::{Session, session::Error as SessionError};

use crate::{
    errors::AppError,
    repository::RepositoryState,
    session::{self, AUTHENTICATED_USER_ID, FLASH, REDIRECT_PATH_AFTER_LOGIN},
};

pub const LOGIN_PATH: &str = "/user/login";
pub const HOME_PATH: &str = "/";

/// Identity
///
/// The per-request authentication fact. It is derived once per request by `authenticate`
/// and attached to the request extensions; it is never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated { user_id: i64 },
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::Authenticated { user_id } => Some(*user_id),
            Identity::Anonymous => None,
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().copied().unwrap_or_default())
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request, for handlers that only run behind
/// the authorization gate. Rejects with 401 if no authenticated identity was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(Identity::user_id)
            .map(|id| AuthUser { id })
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// authenticate
///
/// Pipeline stage. Reads `authenticatedUserID` from the session and, when present, checks
/// that the account still exists. Never rejects on its own: a missing or stale id leaves
/// the request anonymous. A store failure is a fault and aborts the request with a 500.
/// The session is not modified here, even for stale ids.
pub async fn authenticate(
    State(repo): State<RepositoryState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let id = session.get::<i64>(AUTHENTICATED_USER_ID).await?.unwrap_or(0);

    let identity = if id == 0 {
        Identity::Anonymous
    } else if repo.user_exists(id).await? {
        Identity::Authenticated { user_id: id }
    } else {
        tracing::debug!(user_id = id, "session refers to a missing user, treating as anonymous");
        Identity::Anonymous
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// require_authentication
///
/// Authorization gate for the protected route group. Anonymous requests have their path
/// remembered in the session and are redirected (303) to the login page; authenticated
/// responses are marked `Cache-Control: no-store`.
pub async fn require_authentication(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request.extensions().get::<Identity>().copied().unwrap_or_default();

    if !identity.is_authenticated() {
        session
            .insert(REDIRECT_PATH_AFTER_LOGIN, request.uri().path())
            .await?;
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

// --- State transitions ---

/// log_in
///
/// `Anonymous -> Authenticated(user_id)`. The id is rotated before the user id is written.
/// Returns the redirect target: the remembered protected path if one was stored (it is
/// removed in the same step), otherwise the home page.
pub async fn log_in(session: &Session, user_id: i64) -> Result<String, SessionError> {
    session::renew(session).await?;
    session.insert(AUTHENTICATED_USER_ID, user_id).await?;

    let target = session::pop_string(session, REDIRECT_PATH_AFTER_LOGIN)
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| HOME_PATH.to_string());
    Ok(target)
}

/// log_out
///
/// `Authenticated -> Anonymous`. The id is rotated before the user id is removed, then a
/// confirmation flash is queued.
pub async fn log_out(session: &Session) -> Result<(), SessionError> {
    session::renew(session).await?;
    session.remove::<i64>(AUTHENTICATED_USER_ID).await?;
    session.insert(FLASH, "You've been logged out successfully!").await?;
    Ok(())
}

// Only same-site absolute paths are accepted as post-login targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
