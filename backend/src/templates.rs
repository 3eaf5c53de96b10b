use askama::Template;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use tower_sessions::Session;

use crate::{
    auth::Identity,
    csrf::CsrfToken,
    errors::AppError,
    forms::{AccountPasswordUpdateForm, SnippetCreateForm, UserLoginForm, UserSignupForm},
    models::{Snippet, User},
    session,
};

/// PageContext
///
/// Data every page needs from the pipeline: the flash message (consumed on read), whether
/// the request is authenticated, and the CSRF token for embedded forms.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

impl PageContext {
    /// Builds the context for a page about to be rendered. Reading the flash removes it.
    pub async fn build(
        session: &Session,
        identity: Identity,
        CsrfToken(csrf_token): CsrfToken,
    ) -> Result<Self, AppError> {
        let flash = session::pop_string(session, session::FLASH).await?;
        Ok(Self {
            current_year: Utc::now().year(),
            flash,
            is_authenticated: identity.is_authenticated(),
            csrf_token,
        })
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing for page route".to_string()))?;
        let identity = parts.extensions.get::<Identity>().copied().unwrap_or_default();
        let token = CsrfToken::from_request_parts(parts, state).await?;
        Self::build(&session, identity, token).await
    }
}

/// Renders a template into an HTML response with the given status.
pub fn render<T: Template>(status: StatusCode, template: &T) -> Result<Response, AppError> {
    let html = template.render()?;
    Ok((status, Html(html)).into_response())
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub snippets: Vec<Snippet>,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "view.html")]
pub struct SnippetViewTemplate {
    pub page: PageContext,
    pub snippet: Snippet,
}

#[derive(Template)]
#[template(path = "create.html")]
pub struct SnippetCreateTemplate {
    pub page: PageContext,
    pub form: SnippetCreateForm,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct UserSignupTemplate {
    pub page: PageContext,
    pub form: UserSignupForm,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct UserLoginTemplate {
    pub page: PageContext,
    pub form: UserLoginForm,
}

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountViewTemplate {
    pub page: PageContext,
    pub user: User,
}

#[derive(Template)]
#[template(path = "password.html")]
pub struct AccountPasswordUpdateTemplate {
    pub page: PageContext,
    pub form: AccountPasswordUpdateForm,
}
