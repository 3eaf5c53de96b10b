use crate::errors::ModelError;
use crate::models::{Snippet, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};

/// Repository Trait
///
/// The record store contract used by handlers and by the authentication stage of the
/// request pipeline. Implementations return `ModelError::NoRecord`, `DuplicateEmail` and
/// `InvalidCredentials` as expected outcomes; anything else is a fault.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`) shareable
/// across request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Snippets ---
    async fn insert_snippet(&self, title: &str, content: &str, expires_days: i32) -> Result<i64, ModelError>;
    // Unexpired snippet by id.
    async fn get_snippet(&self, id: i64) -> Result<Snippet, ModelError>;
    // Most recently created unexpired snippets, newest first.
    async fn latest_snippets(&self, limit: i64) -> Result<Vec<Snippet>, ModelError>;

    // --- Users ---
    async fn insert_user(&self, name: &str, email: &str, password: &str) -> Result<i64, ModelError>;
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError>;
    async fn user_exists(&self, id: i64) -> Result<bool, ModelError>;
    async fn get_user(&self, id: i64) -> Result<User, ModelError>;
    async fn update_password(&self, id: i64, current_password: &str, new_password: &str) -> Result<(), ModelError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Password hashing (runs off the async executor) ---

async fn hash_password(password: &str, cost: u32) -> Result<String, ModelError> {
    let password = password.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hashed)
}

async fn verify_password(password: &str, hashed: &str) -> Result<bool, ModelError> {
    let password = password.to_string();
    let hashed = hashed.to_string();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await??;
    Ok(ok)
}

/// PostgresRepository
///
/// The production implementation, backed by PostgreSQL through a shared connection pool.
pub struct PostgresRepository {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert_snippet(&self, title: &str, content: &str, expires_days: i32) -> Result<i64, ModelError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO snippets (title, content, created, expires)
            VALUES ($1, $2, NOW(), NOW() + make_interval(days => $3))
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(expires_days)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_snippet(&self, id: i64) -> Result<Snippet, ModelError> {
        sqlx::query_as::<_, Snippet>(
            r#"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW() AND id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ModelError::NoRecord)
    }

    async fn latest_snippets(&self, limit: i64) -> Result<Vec<Snippet>, ModelError> {
        let snippets = sqlx::query_as::<_, Snippet>(
            r#"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW()
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(snippets)
    }

    /// insert_user
    ///
    /// Hashes the password and inserts the account. A violation of the `users_uc_email`
    /// constraint is reported as `DuplicateEmail` rather than as a store fault.
    async fn insert_user(&self, name: &str, email: &str, password: &str) -> Result<i64, ModelError> {
        let hashed = hash_password(password, self.bcrypt_cost).await?;

        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, hashed_password, created)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(hashed)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() && db_err.constraint() == Some("users_uc_email") =>
            {
                Err(ModelError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let (id, hashed) = row.ok_or(ModelError::InvalidCredentials)?;
        if verify_password(password, &hashed).await? {
            Ok(id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn user_exists(&self, id: i64) -> Result<bool, ModelError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT true FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn get_user(&self, id: i64) -> Result<User, ModelError> {
        sqlx::query_as::<_, User>("SELECT id, name, email, created FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ModelError::NoRecord)
    }

    async fn update_password(&self, id: i64, current_password: &str, new_password: &str) -> Result<(), ModelError> {
        let hashed = sqlx::query_scalar::<_, String>("SELECT hashed_password FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ModelError::NoRecord)?;

        if !verify_password(current_password, &hashed).await? {
            return Err(ModelError::InvalidCredentials);
        }

        let new_hashed = hash_password(new_password, self.bcrypt_cost).await?;
        sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
            .bind(new_hashed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// --- In-memory implementation ---

struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct MemoryData {
    snippets: Vec<Snippet>,
    users: Vec<StoredUser>,
}

/// MemoryRepository
///
/// An in-process record store with the same semantics as `PostgresRepository`. Used by
/// the test suite and by local runs without `DATABASE_URL`.
pub struct MemoryRepository {
    data: Mutex<MemoryData>,
    bcrypt_cost: u32,
}

impl MemoryRepository {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            data: Mutex::new(MemoryData::default()),
            bcrypt_cost,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryData> {
        // A poisoned lock only means another request panicked mid-update; the data is still usable.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn hashed_password(&self, id: i64) -> Option<String> {
        self.lock()
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.hashed_password.clone())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_snippet(&self, title: &str, content: &str, expires_days: i32) -> Result<i64, ModelError> {
        let mut data = self.lock();
        let id = data.snippets.len() as i64 + 1;
        let created = Utc::now();
        data.snippets.push(Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created,
            expires: created + Duration::days(expires_days.into()),
        });
        Ok(id)
    }

    async fn get_snippet(&self, id: i64) -> Result<Snippet, ModelError> {
        let now = Utc::now();
        self.lock()
            .snippets
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(ModelError::NoRecord)
    }

    async fn latest_snippets(&self, limit: i64) -> Result<Vec<Snippet>, ModelError> {
        let now = Utc::now();
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()
            .snippets
            .iter()
            .rev()
            .filter(|s| s.expires > now)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_user(&self, name: &str, email: &str, password: &str) -> Result<i64, ModelError> {
        let hashed_password = hash_password(password, self.bcrypt_cost).await?;

        let mut data = self.lock();
        if data.users.iter().any(|u| u.user.email == email) {
            return Err(ModelError::DuplicateEmail);
        }
        let id = data.users.len() as i64 + 1;
        data.users.push(StoredUser {
            user: User {
                id,
                name: name.to_string(),
                email: email.to_string(),
                created: Utc::now(),
            },
            hashed_password,
        });
        Ok(id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let found = self
            .lock()
            .users
            .iter()
            .find(|u| u.user.email == email)
            .map(|u| (u.user.id, u.hashed_password.clone()));

        let (id, hashed) = found.ok_or(ModelError::InvalidCredentials)?;
        if verify_password(password, &hashed).await? {
            Ok(id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn user_exists(&self, id: i64) -> Result<bool, ModelError> {
        Ok(self.lock().users.iter().any(|u| u.user.id == id))
    }

    async fn get_user(&self, id: i64) -> Result<User, ModelError> {
        self.lock()
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
            .ok_or(ModelError::NoRecord)
    }

    async fn update_password(&self, id: i64, current_password: &str, new_password: &str) -> Result<(), ModelError> {
        let hashed = self.hashed_password(id).ok_or(ModelError::NoRecord)?;
        if !verify_password(current_password, &hashed).await? {
            return Err(ModelError::InvalidCredentials);
        }

        let new_hashed = hash_password(new_password, self.bcrypt_cost).await?;
        if let Some(stored) = self.lock().users.iter_mut().find(|u| u.user.id == id) {
            stored.hashed_password = new_hashed;
        }
        Ok(())
    }
}
