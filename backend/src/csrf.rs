use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, Method, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_sessions::{Session, session::Error as SessionError};

use crate::{errors::AppError, session::CSRF_SEED};

type HmacSha256 = Hmac<Sha256>;

/// Header checked before falling back to the form field.
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
/// Hidden form field carrying the token in HTML forms.
pub const CSRF_FORM_FIELD: &str = "csrf_token";

const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

/// CsrfProtection
///
/// Issues and verifies synchronizer tokens. Each session holds a random seed; the token
/// handed to pages is an HMAC of that seed under the server secret, so it is only valid
/// for the session (and session id generation) it was issued for.
#[derive(Clone)]
pub struct CsrfProtection {
    key: Arc<[u8]>,
}

impl CsrfProtection {
    pub fn new(secret: &[u8]) -> Self {
        Self { key: Arc::from(secret) }
    }

    fn token_for_seed(&self, seed: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(seed.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Returns the token for this session, seeding the session first if needed.
    pub async fn issue_token(&self, session: &Session) -> Result<String, SessionError> {
        let seed = match session.get::<String>(CSRF_SEED).await? {
            Some(seed) => seed,
            None => {
                let seed = new_seed();
                session.insert(CSRF_SEED, &seed).await?;
                seed
            }
        };
        Ok(self.token_for_seed(&seed))
    }

    /// The token for this session if it has already been seeded. Never writes.
    pub async fn current_token(&self, session: &Session) -> Result<Option<String>, SessionError> {
        let seed = session.get::<String>(CSRF_SEED).await?;
        Ok(seed.map(|seed| self.token_for_seed(&seed)))
    }

    /// Checks a presented token against this session. A session without a seed never verifies.
    pub async fn verify(&self, session: &Session, presented: &str) -> Result<bool, SessionError> {
        let Some(expected) = self.current_token(session).await? else {
            return Ok(false);
        };
        Ok(expected.as_bytes().ct_eq(presented.as_bytes()).into())
    }
}

fn new_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Replaces the session's seed. Called whenever the session id rotates.
pub async fn reseed(session: &Session) -> Result<(), SessionError> {
    session.insert(CSRF_SEED, new_seed()).await
}

/// CsrfToken
///
/// The token for the current request, attached by `verify_csrf` for pages to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AppError::Internal("CSRF stage did not run for this route".to_string()))
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn header_token(value: Option<&HeaderValue>) -> Option<String> {
    value.and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Pulls the presented token out of the request. For form posts the body is buffered,
/// searched for the token field, and handed back so the handler can decode it again.
async fn presented_token(request: Request) -> Result<(Option<String>, Request), AppError> {
    if let Some(token) = header_token(request.headers().get(CSRF_HEADER_NAME)) {
        return Ok((Some(token), request));
    }
    if !is_form(&request) {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AppError::bad_request())?;
    let token = url::form_urlencoded::parse(&bytes)
        .find(|(key, _)| key == CSRF_FORM_FIELD)
        .map(|(_, value)| value.into_owned());

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

/// verify_csrf
///
/// Pipeline stage. Makes the session's token available to the rest of the request and,
/// for unsafe methods, rejects with 403 unless the request echoes that token back.
/// Only safe methods seed a session; a rejected unsafe request leaves the store untouched.
pub async fn verify_csrf(
    State(csrf): State<CsrfProtection>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_safe_method(request.method()) {
        let token = csrf.issue_token(&session).await?;
        request.extensions_mut().insert(CsrfToken(token));
        return Ok(next.run(request).await);
    }

    let expected = csrf.current_token(&session).await?;
    let (presented, mut request) = presented_token(request).await?;
    let token = match (expected, presented) {
        (Some(expected), Some(presented))
            if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) =>
        {
            expected
        }
        _ => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "CSRF token missing or invalid"
            );
            return Err(AppError::Client(StatusCode::FORBIDDEN));
        }
    };

    request.extensions_mut().insert(CsrfToken(token));
    Ok(next.run(request).await)
}
