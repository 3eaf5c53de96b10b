//! Session keys and helpers shared by the pipeline stages and handlers.
//!
//! Loading and saving is done by `tower_sessions::SessionManagerLayer`: the record is read
//! lazily on first access and written back after the handler returns, and only when the
//! session was modified during the request.
//!
//! Sessions have an absolute lifetime. The deadline is stored in the session itself and
//! pinned onto every save by `pin_lifetime`; only `renew` starts a new one.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use tower_sessions::{
    Expiry, Session, SessionManagerLayer, SessionStore,
    cookie::SameSite,
    session::Error as SessionError,
};

use crate::{config::AppConfig, csrf, errors::AppError};

pub const SESSION_COOKIE_NAME: &str = "session";

pub const FLASH: &str = "flash";
pub const AUTHENTICATED_USER_ID: &str = "authenticatedUserID";
pub const REDIRECT_PATH_AFTER_LOGIN: &str = "redirectPathAfterLogin";
pub const CSRF_SEED: &str = "csrfSeed";
/// Absolute deadline of the session, in Unix milliseconds.
pub const EXPIRES_AT: &str = "sessionExpiresAt";

/// Builds the session load-and-save layer for the dynamic route group.
///
/// The layer's own expiry only applies to sessions that are never saved; saved sessions
/// always carry the deadline set by `pin_lifetime`.
pub fn session_layer<Store>(store: Store, config: &AppConfig) -> SessionManagerLayer<Store>
where
    Store: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_path("/")
        .with_http_only(true)
        .with_secure(config.session_cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(config.session_lifetime()))
}

/// Reads a string value and removes it in the same step. An absent key leaves the session
/// unmodified, so pages without a flash do not cause a store write.
pub async fn pop_string(session: &Session, key: &str) -> Result<Option<String>, SessionError> {
    let value = session.get::<String>(key).await?;
    if value.is_some() {
        session.remove_value(key).await?;
    }
    Ok(value)
}

pub async fn put_flash(session: &Session, message: &str) -> Result<(), SessionError> {
    session.insert(FLASH, message).await
}

/// renew
///
/// Rotates the session id while keeping its values, and replaces the CSRF seed so that
/// tokens issued under the old id stop verifying. The lifetime restarts from now. Must run
/// before any change to the authentication state stored in the session.
pub async fn renew(session: &Session) -> Result<(), SessionError> {
    session.cycle_id().await?;
    session.remove_value(EXPIRES_AT).await?;
    csrf::reseed(session).await
}

fn deadline_from_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Fixes the expiry of a session that is about to be saved. A session without a deadline
/// (new, or just renewed) gets `now + lifetime`; otherwise the stored deadline is reused,
/// so activity never extends it. Unmodified sessions are left alone and are not written.
pub async fn apply_lifetime(session: &Session, lifetime: time::Duration) -> Result<(), SessionError> {
    if !session.is_modified() || session.is_empty().await {
        return Ok(());
    }

    let stored = session
        .get::<i64>(EXPIRES_AT)
        .await?
        .and_then(deadline_from_millis);

    let deadline = match stored {
        Some(deadline) => deadline,
        None => {
            let deadline = OffsetDateTime::now_utc() + lifetime;
            let millis = (deadline.unix_timestamp_nanos() / 1_000_000) as i64;
            session.insert(EXPIRES_AT, millis).await?;
            // Reuse the truncated value so the record and the stored key agree.
            deadline_from_millis(millis).unwrap_or(deadline)
        }
    };

    session.set_expiry(Some(Expiry::AtDateTime(deadline)));
    Ok(())
}

/// pin_lifetime
///
/// Pipeline stage directly inside the session layer. Runs the rest of the request, then
/// pins the absolute deadline onto the session before the layer saves it.
pub async fn pin_lifetime(
    State(config): State<AppConfig>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let response = next.run(request).await;
    apply_lifetime(&session, config.session_lifetime()).await?;
    Ok(response)
}
