use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::Response,
};
use snippetbox::{
    AppConfig, AppState, ModelError, create_router,
    models::{Snippet, User},
    repository::{MemoryRepository, Repository, RepositoryState},
};
use std::{
    str::FromStr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use time::OffsetDateTime;
use tower::ServiceExt;
use tower_sessions::{
    MemoryStore, SessionStore,
    session::{Id, Record},
};

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "pa55word!";

// --- MOCK REPOSITORY IMPLEMENTATION ---

// How `user_exists` answers: from the real data, as if the user was deleted, or with a
// store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExistsMode {
    Real,
    Missing,
    Fail,
}

// Wraps the in-memory store with fault injection and a counter of state-changing calls.
struct TestRepo {
    inner: MemoryRepository,
    exists_mode: Mutex<ExistsMode>,
    panic_on_latest: AtomicBool,
    fail_authenticate: AtomicBool,
    calls: AtomicUsize,
}

impl TestRepo {
    fn new() -> Self {
        Self {
            inner: MemoryRepository::new(4),
            exists_mode: Mutex::new(ExistsMode::Real),
            panic_on_latest: AtomicBool::new(false),
            fail_authenticate: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn set_exists_mode(&self, mode: ExistsMode) {
        *self.exists_mode.lock().unwrap() = mode;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for TestRepo {
    async fn insert_snippet(&self, title: &str, content: &str, expires_days: i32) -> Result<i64, ModelError> {
        self.count();
        self.inner.insert_snippet(title, content, expires_days).await
    }
    async fn get_snippet(&self, id: i64) -> Result<Snippet, ModelError> {
        self.inner.get_snippet(id).await
    }
    async fn latest_snippets(&self, limit: i64) -> Result<Vec<Snippet>, ModelError> {
        if self.panic_on_latest.load(Ordering::SeqCst) {
            panic!("latest_snippets exploded");
        }
        self.inner.latest_snippets(limit).await
    }
    async fn insert_user(&self, name: &str, email: &str, password: &str) -> Result<i64, ModelError> {
        self.count();
        self.inner.insert_user(name, email, password).await
    }
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        self.count();
        if self.fail_authenticate.load(Ordering::SeqCst) {
            return Err(ModelError::Store(sqlx::Error::PoolTimedOut));
        }
        self.inner.authenticate(email, password).await
    }
    async fn user_exists(&self, id: i64) -> Result<bool, ModelError> {
        let mode = *self.exists_mode.lock().unwrap();
        match mode {
            ExistsMode::Real => self.inner.user_exists(id).await,
            ExistsMode::Missing => Ok(false),
            ExistsMode::Fail => Err(ModelError::Store(sqlx::Error::PoolTimedOut)),
        }
    }
    async fn get_user(&self, id: i64) -> Result<User, ModelError> {
        self.inner.get_user(id).await
    }
    async fn update_password(&self, id: i64, current_password: &str, new_password: &str) -> Result<(), ModelError> {
        self.count();
        self.inner.update_password(id, current_password, new_password).await
    }
}

// --- Test Harness ---

struct TestApp {
    router: Router,
    repo: Arc<TestRepo>,
    store: MemoryStore,
}

fn spawn_app() -> TestApp {
    let repo = Arc::new(TestRepo::new());
    let store = MemoryStore::default();
    let state = AppState::new(repo.clone() as RepositoryState, AppConfig::default());
    let router = create_router(state, store.clone());
    TestApp { router, repo, store }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("session={cookie}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("session={cookie}"));
    }
    builder.body(Body::from(body)).unwrap()
}

/// The `session` cookie value set by a response, if any.
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session="))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The first embedded CSRF token on a rendered page.
fn csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("page embeds a CSRF token") + marker.len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].to_string()
}

fn assert_security_headers(headers: &HeaderMap) {
    assert_eq!(
        headers["content-security-policy"],
        "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com"
    );
    assert_eq!(headers["referrer-policy"], "origin-when-cross-origin");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "deny");
    assert_eq!(headers["x-xss-protection"], "0");
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn record(&self, cookie: &str) -> Option<Record> {
        let id = Id::from_str(cookie).expect("session cookie holds a session id");
        self.store.load(&id).await.unwrap()
    }

    async fn seed_user(&self) -> i64 {
        self.repo.inner.insert_user("Alice", EMAIL, PASSWORD).await.unwrap()
    }

    /// Loads a page and returns the (possibly new) session cookie and the page's token.
    async fn page_token(&self, uri: &str, cookie: Option<&str>) -> (String, String) {
        let response = self.send(get(uri, cookie)).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        let cookie = session_cookie(&response)
            .or_else(|| cookie.map(str::to_string))
            .expect("a session was started");
        let token = csrf_token(&body_string(response).await);
        (cookie, token)
    }

    /// Logs in through the login form and returns the rotated session cookie.
    async fn login(&self, cookie: Option<&str>) -> (String, Response) {
        let (cookie, token) = self.page_token("/user/login", cookie).await;
        let response = self
            .send(post_form(
                "/user/login",
                Some(&cookie),
                &[("csrf_token", token.as_str()), ("email", EMAIL), ("password", PASSWORD)],
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let rotated = session_cookie(&response).expect("login sets a new session cookie");
        assert_ne!(rotated, cookie, "login must rotate the session id");
        (rotated, response)
    }
}

// --- Outer pipeline ---

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = spawn_app();

    let response = app.send(get("/ping", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_security_headers(response.headers());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_string(response).await, "OK");

    let not_found = app.send(get("/no/such/page", None)).await;
    assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
    assert_security_headers(not_found.headers());
}

#[tokio::test]
async fn test_unknown_method_on_known_path_is_405() {
    let app = spawn_app();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/about")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_static_files_skip_the_session_layer() {
    let app = spawn_app();
    let response = app.send(get("/static/css/main.css", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_panic_is_recovered_as_500() {
    let app = spawn_app();
    app.repo.panic_on_latest.store(true, Ordering::SeqCst);

    let response = app.send(get("/", None)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::CONNECTION], "close");
    assert_security_headers(response.headers());
    assert_eq!(body_string(response).await, "Internal Server Error");

    // The router keeps serving after the panic.
    app.repo.panic_on_latest.store(false, Ordering::SeqCst);
    assert_eq!(app.send(get("/", None)).await.status(), StatusCode::OK);
}

// --- CSRF verification ---

#[tokio::test]
async fn test_post_without_token_is_403_and_skips_handler() {
    let app = spawn_app();
    let fields = [("name", "Bob"), ("email", "bob@example.com"), ("password", "pa55word!")];

    let response = app.send(post_form("/user/signup", None, &fields)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A live session does not help without the token.
    let (cookie, _) = app.page_token("/user/signup", None).await;
    let response = app.send(post_form("/user/signup", Some(&cookie), &fields)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut forged = fields.to_vec();
    forged.push(("csrf_token", "forged"));
    let response = app.send(post_form("/user/signup", Some(&cookie), &forged)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.repo.calls(), 0, "no handler may run after a CSRF failure");
}

#[tokio::test]
async fn test_rejected_post_does_not_touch_the_session_store() {
    let app = spawn_app();
    let fields = [("csrf_token", "forged"), ("email", EMAIL), ("password", PASSWORD)];

    // No session yet: nothing may be created for a forged request.
    let response = app.send(post_form("/user/login", None, &fields)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(session_cookie(&response).is_none());

    // An existing session is not rewritten either.
    let (cookie, _) = app.page_token("/user/login", None).await;
    let before = app.record(&cookie).await.unwrap();
    let response = app.send(post_form("/user/login", Some(&cookie), &fields)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(session_cookie(&response).is_none());
    let after = app.record(&cookie).await.unwrap();
    assert_eq!(after.data, before.data);
    assert_eq!(after.expiry_date, before.expiry_date);
}

#[tokio::test]
async fn test_token_from_another_session_is_403() {
    let app = spawn_app();
    let (_, token_a) = app.page_token("/user/signup", None).await;
    let (cookie_b, _) = app.page_token("/user/signup", None).await;

    let response = app
        .send(post_form(
            "/user/signup",
            Some(&cookie_b),
            &[
                ("csrf_token", token_a.as_str()),
                ("name", "Bob"),
                ("email", "bob@example.com"),
                ("password", "pa55word!"),
            ],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.repo.calls(), 0);
}

#[tokio::test]
async fn test_token_accepted_from_header() {
    let app = spawn_app();
    let (cookie, token) = app.page_token("/user/login", None).await;

    let body = format!("email={}&password=wrongpass", "nobody%40example.com");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/user/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, format!("session={cookie}"))
        .header("x-csrf-token", token)
        .body(Body::from(body))
        .unwrap();

    let response = app.send(request).await;
    // Past the CSRF stage: the handler ran and rejected the credentials.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.repo.calls(), 1);
}

// --- Authorization gate and login/logout ---

#[tokio::test]
async fn test_anonymous_protected_get_redirects_to_login() {
    let app = spawn_app();

    let response = app.send(get("/snippet/create", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/login");
}

#[tokio::test]
async fn test_login_returns_to_remembered_path_once() {
    let app = spawn_app();
    app.seed_user().await;

    let response = app.send(get("/account/view", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response).expect("gate stores the path in a session");
    let record = app.record(&cookie).await.unwrap();
    assert_eq!(record.data["redirectPathAfterLogin"], serde_json::json!("/account/view"));

    let (rotated, response) = app.login(Some(&cookie)).await;
    assert_eq!(location(&response), "/account/view");

    let record = app.record(&rotated).await.unwrap();
    assert!(!record.data.contains_key("redirectPathAfterLogin"));
    assert!(record.data.contains_key("authenticatedUserID"));

    // A second login without a remembered path goes home.
    let (_, response) = app.login(Some(&rotated)).await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_then_logout_rotates_twice() {
    let app = spawn_app();
    app.seed_user().await;

    let (pre_login, _) = app.page_token("/user/login", None).await;
    let (post_login, _) = app.login(Some(&pre_login)).await;

    let (_, token) = app.page_token("/", Some(&post_login)).await;
    let response = app
        .send(post_form("/user/logout", Some(&post_login), &[("csrf_token", token.as_str())]))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let post_logout = session_cookie(&response).expect("logout sets a new session cookie");
    assert_ne!(post_logout, pre_login);
    assert_ne!(post_logout, post_login);

    let record = app.record(&post_logout).await.unwrap();
    assert!(!record.data.contains_key("authenticatedUserID"));
    assert!(record.data.contains_key("flash"));

    // Rotated-away ids are gone from the store.
    assert!(app.record(&pre_login).await.is_none());
    assert!(app.record(&post_login).await.is_none());
}

#[tokio::test]
async fn test_wrong_password_is_400_without_rotation() {
    let app = spawn_app();
    app.repo.inner.insert_user("A", "a@b.com", "rightpass").await.unwrap();
    let (cookie, token) = app.page_token("/user/login", None).await;

    let response = app
        .send(post_form(
            "/user/login",
            Some(&cookie),
            &[("csrf_token", token.as_str()), ("email", "a@b.com"), ("password", "wrongpass")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_cookie(&response).is_none_or(|c| c == cookie));
    assert!(body_string(response).await.contains("Email or Password is incorrect"));

    let record = app.record(&cookie).await.expect("original session still live");
    assert!(!record.data.contains_key("authenticatedUserID"));
}

#[tokio::test]
async fn test_store_fault_during_login_is_500_without_rotation() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, token) = app.page_token("/user/login", None).await;
    app.repo.fail_authenticate.store(true, Ordering::SeqCst);

    let response = app
        .send(post_form(
            "/user/login",
            Some(&cookie),
            &[("csrf_token", token.as_str()), ("email", EMAIL), ("password", PASSWORD)],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&response).is_none());
    assert_eq!(body_string(response).await, "Internal Server Error");

    let record = app.record(&cookie).await.expect("original session still live");
    assert!(!record.data.contains_key("authenticatedUserID"));
}

#[tokio::test]
async fn test_session_lifetime_is_fixed_until_renewal() {
    let app = spawn_app();
    app.seed_user().await;

    // The gate stores the requested path, which starts the session.
    let response = app.send(get("/account/view", None)).await;
    let cookie = session_cookie(&response).expect("gate starts a session");
    let deadline = app.record(&cookie).await.unwrap().expiry_date;
    let remaining = deadline - OffsetDateTime::now_utc();
    assert!(remaining > time::Duration::hours(11));
    assert!(remaining <= time::Duration::hours(12));

    // Later writes to the same session keep its deadline.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let response = app.send(get("/snippet/create", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(session_cookie(&response).is_some(), "the session was written again");
    let record = app.record(&cookie).await.unwrap();
    assert_eq!(record.data["redirectPathAfterLogin"], serde_json::json!("/snippet/create"));
    assert_eq!(record.expiry_date, deadline);

    // Rotation on login starts a fresh lifetime.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let (rotated, _) = app.login(Some(&cookie)).await;
    let renewed = app.record(&rotated).await.unwrap().expiry_date;
    assert!(renewed > deadline);

    // And that one is kept across further writes too.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let (rotated, token) = app.page_token("/snippet/create", Some(&rotated)).await;
    let response = app
        .send(post_form(
            "/snippet/create",
            Some(&rotated),
            &[
                ("csrf_token", token.as_str()),
                ("title", "O snail"),
                ("content", "Climb Mount Fuji"),
                ("expires", "7"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let record = app.record(&rotated).await.unwrap();
    assert!(record.data.contains_key("flash"));
    assert_eq!(record.expiry_date, renewed);
}

#[tokio::test]
async fn test_logout_requires_login() {
    let app = spawn_app();
    let (cookie, token) = app.page_token("/user/login", None).await;

    let response = app
        .send(post_form("/user/logout", Some(&cookie), &[("csrf_token", token.as_str())]))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/login");
}

// --- Authentication-context derivation ---

#[tokio::test]
async fn test_protected_pages_are_not_cached() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;

    let response = app.send(get("/account/view", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert!(body_string(response).await.contains(EMAIL));

    let public = app.send(get("/about", Some(&cookie))).await;
    assert!(!public.headers().contains_key(header::CACHE_CONTROL));
}

#[tokio::test]
async fn test_stale_user_is_anonymous_and_session_kept() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;

    app.repo.set_exists_mode(ExistsMode::Missing);
    let response = app.send(get("/account/view", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/login");
    let record = app.record(&cookie).await.unwrap();
    assert!(record.data.contains_key("authenticatedUserID"));
}

#[tokio::test]
async fn test_store_fault_during_existence_check_is_500() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;

    app.repo.set_exists_mode(ExistsMode::Fail);
    let response = app.send(get("/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Internal Server Error");

    // Anonymous requests never reach the existence check.
    assert_eq!(app.send(get("/", None)).await.status(), StatusCode::OK);
}

// --- Handlers behind the pipeline ---

#[tokio::test]
async fn test_blank_title_is_400_without_insert() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;
    let (cookie, token) = app.page_token("/snippet/create", Some(&cookie)).await;
    let calls_before = app.repo.calls();

    let response = app
        .send(post_form(
            "/snippet/create",
            Some(&cookie),
            &[("csrf_token", token.as_str()), ("title", ""), ("content", "hi"), ("expires", "7")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("This field cannot be blank"));
    assert_eq!(app.repo.calls(), calls_before);
    assert!(app.repo.inner.latest_snippets(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_and_view_snippet() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;
    let (cookie, token) = app.page_token("/snippet/create", Some(&cookie)).await;

    let response = app
        .send(post_form(
            "/snippet/create",
            Some(&cookie),
            &[
                ("csrf_token", token.as_str()),
                ("title", "O snail"),
                ("content", "Climb Mount Fuji"),
                ("expires", "7"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/snippet/view/1");

    let page = body_string(app.send(get("/snippet/view/1", Some(&cookie))).await).await;
    assert!(page.contains("O snail"));
    assert!(page.contains("Snippet successfully created!"));

    // The flash is shown once.
    let again = body_string(app.send(get("/snippet/view/1", Some(&cookie))).await).await;
    assert!(!again.contains("Snippet successfully created!"));
}

#[tokio::test]
async fn test_snippet_view_bad_ids_are_404() {
    let app = spawn_app();
    app.repo.inner.insert_snippet("t", "c", 7).await.unwrap();

    assert_eq!(app.send(get("/snippet/view/1", None)).await.status(), StatusCode::OK);
    for uri in ["/snippet/view/abc", "/snippet/view/0", "/snippet/view/-1", "/snippet/view/99"] {
        assert_eq!(app.send(get(uri, None)).await.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_signup_and_duplicate_email() {
    let app = spawn_app();
    let (cookie, token) = app.page_token("/user/signup", None).await;
    let fields = [
        ("csrf_token", token.as_str()),
        ("name", "Alice"),
        ("email", EMAIL),
        ("password", PASSWORD),
    ];

    let response = app.send(post_form("/user/signup", Some(&cookie), &fields)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/login");

    let response = app.send(post_form("/user/signup", Some(&cookie), &fields)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Email address is already in use"));
}

#[tokio::test]
async fn test_password_update() {
    let app = spawn_app();
    app.seed_user().await;
    let (cookie, _) = app.login(None).await;
    let (cookie, token) = app.page_token("/account/password/update", Some(&cookie)).await;

    let response = app
        .send(post_form(
            "/account/password/update",
            Some(&cookie),
            &[
                ("csrf_token", token.as_str()),
                ("currentPassword", "not-my-password"),
                ("newPassword", "brandnew123"),
                ("newPasswordConfirmation", "brandnew123"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Current password is incorrect"));

    let response = app
        .send(post_form(
            "/account/password/update",
            Some(&cookie),
            &[
                ("csrf_token", token.as_str()),
                ("currentPassword", PASSWORD),
                ("newPassword", "brandnew123"),
                ("newPasswordConfirmation", "brandnew123"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/account/view");
    assert!(app.repo.inner.authenticate(EMAIL, "brandnew123").await.is_ok());
}
