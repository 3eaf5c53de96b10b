use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::{
    auth::{self, AuthUser, Identity},
    csrf::CsrfToken,
    errors::{AppError, ModelError},
    forms::{AccountPasswordUpdateForm, FormFields, SnippetCreateForm, UserLoginForm, UserSignupForm},
    repository::RepositoryState,
    session,
    templates::{
        AboutTemplate, AccountPasswordUpdateTemplate, AccountViewTemplate, HomeTemplate, PageContext,
        SnippetCreateTemplate, SnippetViewTemplate, UserLoginTemplate, UserSignupTemplate, render,
    },
};

const LATEST_SNIPPETS: i64 = 10;

/// Per-request inputs a POST handler needs only when it re-renders its form.
struct Rerender {
    session: Session,
    identity: Identity,
    token: CsrfToken,
}

impl Rerender {
    async fn page(self) -> Result<PageContext, AppError> {
        PageContext::build(&self.session, self.identity, self.token).await
    }
}

// --- Public pages ---

/// home
///
/// [Dynamic Route] Lists the latest unexpired snippets, newest first.
pub async fn home(
    State(repo): State<RepositoryState>,
    page: PageContext,
) -> Result<Response, AppError> {
    let snippets = repo.latest_snippets(LATEST_SNIPPETS).await?;
    render(StatusCode::OK, &HomeTemplate { page, snippets })
}

pub async fn about(page: PageContext) -> Result<Response, AppError> {
    render(StatusCode::OK, &AboutTemplate { page })
}

/// snippet_view
///
/// [Dynamic Route] Shows one snippet. The id segment must be a positive integer; anything
/// else, like a missing or expired snippet, is a 404.
pub async fn snippet_view(
    State(repo): State<RepositoryState>,
    Path(raw_id): Path<String>,
    page: PageContext,
) -> Result<Response, AppError> {
    let id = match raw_id.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => return Err(AppError::not_found()),
    };

    match repo.get_snippet(id).await {
        Ok(snippet) => render(StatusCode::OK, &SnippetViewTemplate { page, snippet }),
        Err(ModelError::NoRecord) => Err(AppError::not_found()),
        Err(e) => Err(e.into()),
    }
}

pub async fn ping() -> &'static str {
    "OK"
}

// --- Snippet creation ---

pub async fn snippet_create(page: PageContext) -> Result<Response, AppError> {
    let form = SnippetCreateForm::default();
    render(StatusCode::OK, &SnippetCreateTemplate { page, form })
}

/// snippet_create_post
///
/// [Protected Route] Validates the submission and inserts the snippet. Invalid input
/// re-renders the form with a 400 and never reaches the store.
pub async fn snippet_create_post(
    State(repo): State<RepositoryState>,
    session: Session,
    identity: Identity,
    token: CsrfToken,
    Form(fields): Form<FormFields>,
) -> Result<Response, AppError> {
    let mut form = SnippetCreateForm::decode(&fields)?;
    if !form.validate() {
        let page = Rerender { session, identity, token }.page().await?;
        return render(StatusCode::BAD_REQUEST, &SnippetCreateTemplate { page, form });
    }

    let id = repo
        .insert_snippet(&form.title, &form.content, form.expires)
        .await?;
    tracing::info!(snippet_id = id, "snippet created");

    session::put_flash(&session, "Snippet successfully created!").await?;
    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}

// --- Signup, login, logout ---

pub async fn user_signup(page: PageContext) -> Result<Response, AppError> {
    let form = UserSignupForm::default();
    render(StatusCode::OK, &UserSignupTemplate { page, form })
}

pub async fn user_signup_post(
    State(repo): State<RepositoryState>,
    session: Session,
    identity: Identity,
    token: CsrfToken,
    Form(fields): Form<FormFields>,
) -> Result<Response, AppError> {
    let mut form = UserSignupForm::decode(&fields);
    if form.validate() {
        match repo.insert_user(&form.name, &form.email, &form.password).await {
            Ok(id) => {
                tracing::info!(user_id = id, "user signed up");
                session::put_flash(&session, "Your signup was successful. Please log in.").await?;
                return Ok(Redirect::to(auth::LOGIN_PATH).into_response());
            }
            Err(ModelError::DuplicateEmail) => {
                form.validator
                    .add_field_error("email", "Email address is already in use");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let page = Rerender { session, identity, token }.page().await?;
    render(StatusCode::BAD_REQUEST, &UserSignupTemplate { page, form })
}

pub async fn user_login(page: PageContext) -> Result<Response, AppError> {
    let form = UserLoginForm::default();
    render(StatusCode::OK, &UserLoginTemplate { page, form })
}

/// user_login_post
///
/// [Dynamic Route] Checks the credentials and, on success, performs the
/// `Anonymous -> Authenticated` transition (`auth::log_in`). Bad credentials leave the
/// session untouched and re-render the form with a generic non-field error.
pub async fn user_login_post(
    State(repo): State<RepositoryState>,
    session: Session,
    identity: Identity,
    token: CsrfToken,
    Form(fields): Form<FormFields>,
) -> Result<Response, AppError> {
    let mut form = UserLoginForm::decode(&fields);
    if form.validate() {
        match repo.authenticate(&form.email, &form.password).await {
            Ok(id) => {
                let target = auth::log_in(&session, id).await?;
                tracing::info!(user_id = id, "user logged in");
                return Ok(Redirect::to(&target).into_response());
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator
                    .add_non_field_error("Email or Password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let page = Rerender { session, identity, token }.page().await?;
    render(StatusCode::BAD_REQUEST, &UserLoginTemplate { page, form })
}

pub async fn user_logout_post(session: Session, user: AuthUser) -> Result<Response, AppError> {
    auth::log_out(&session).await?;
    tracing::info!(user_id = user.id, "user logged out");
    Ok(Redirect::to(auth::HOME_PATH).into_response())
}

// --- Account ---

/// account_view
///
/// [Protected Route] Shows the signed-in user's account. If the account disappeared
/// between the gate and this lookup, the user is sent back to the login page.
pub async fn account_view(
    State(repo): State<RepositoryState>,
    user: AuthUser,
    page: PageContext,
) -> Result<Response, AppError> {
    match repo.get_user(user.id).await {
        Ok(user) => render(StatusCode::OK, &AccountViewTemplate { page, user }),
        Err(ModelError::NoRecord) => Ok(Redirect::to(auth::LOGIN_PATH).into_response()),
        Err(e) => Err(e.into()),
    }
}

pub async fn account_password_update(page: PageContext) -> Result<Response, AppError> {
    let form = AccountPasswordUpdateForm::default();
    render(StatusCode::OK, &AccountPasswordUpdateTemplate { page, form })
}

pub async fn account_password_update_post(
    State(repo): State<RepositoryState>,
    user: AuthUser,
    session: Session,
    identity: Identity,
    token: CsrfToken,
    Form(fields): Form<FormFields>,
) -> Result<Response, AppError> {
    let mut form = AccountPasswordUpdateForm::decode(&fields);
    if form.validate() {
        match repo
            .update_password(user.id, &form.current_password, &form.new_password)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = user.id, "password updated");
                session::put_flash(&session, "Your password has been updated!").await?;
                return Ok(Redirect::to("/account/view").into_response());
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator
                    .add_field_error("currentPassword", "Current password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let page = Rerender { session, identity, token }.page().await?;
    render(StatusCode::BAD_REQUEST, &AccountPasswordUpdateTemplate { page, form })
}
