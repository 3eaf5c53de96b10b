use std::{env, str::FromStr, time::Duration};

const LOCAL_CSRF_SECRET: &str = "local-development-csrf-secret-do-not-use-in-prod";

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers and pipeline stages via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker.
    pub env: Env,
    // Listen address for the HTTP server.
    pub addr: String,
    // Postgres connection string. Optional locally, where an in-memory store is used instead.
    pub db_url: Option<String>,
    // Server-side key for deriving CSRF tokens from session seeds.
    pub csrf_secret: String,
    // Absolute session lifetime in hours.
    pub session_lifetime_hours: i64,
    // Whether the session cookie carries the `Secure` attribute.
    pub session_cookie_secure: bool,
    // Upper bound for handling a whole request.
    pub request_timeout: Duration,
    // Upper bound for a single store call (pool acquire and statement timeout).
    pub store_timeout: Duration,
    // Directory served under /static.
    pub static_dir: String,
    // bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

/// Env
///
/// Defines the runtime context: relaxed defaults for local development, mandatory
/// secrets and a real database in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup, independent of the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            addr: "127.0.0.1:4000".to_string(),
            db_url: None,
            csrf_secret: LOCAL_CSRF_SECRET.to_string(),
            session_lifetime_hours: 12,
            session_cookie_secure: false,
            request_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
            static_dir: "./ui/static".to_string(),
            bcrypt_cost: 4,
        }
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparsable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables, failing fast when the current
    /// environment needs a value that is missing.
    ///
    /// # Panics
    /// Panics in production if `DATABASE_URL` or `CSRF_SECRET` is not set.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (db_url, csrf_secret, cookie_secure_default) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("CSRF_SECRET").expect("FATAL: CSRF_SECRET must be set in production."),
                true,
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok(),
                env::var("CSRF_SECRET").unwrap_or_else(|_| LOCAL_CSRF_SECRET.to_string()),
                false,
            ),
        };

        Self {
            env,
            addr: env::var("ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string()),
            db_url,
            csrf_secret,
            session_lifetime_hours: parsed_or("SESSION_LIFETIME_HOURS", 12),
            session_cookie_secure: parsed_or("SESSION_COOKIE_SECURE", cookie_secure_default),
            request_timeout: Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 10)),
            store_timeout: Duration::from_secs(parsed_or("STORE_TIMEOUT_SECS", 5)),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "./ui/static".to_string()),
            bcrypt_cost: parsed_or("BCRYPT_COST", 12),
        }
    }

    pub fn session_lifetime(&self) -> time::Duration {
        time::Duration::hours(self.session_lifetime_hours)
    }
}
