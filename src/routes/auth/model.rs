use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, conflict_on_unique};
use crate::permissions::{Permissions, Role};
use crate::utils::{hash_password, verify_password};

#[derive(Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A user as returned to clients: no password hash, permissions attached.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub permissions: Permissions,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let permissions = user.role.permissions();
        Self { user, permissions }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_at: i64,
    pub user: UserProfile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .finish()
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let len = self.username.chars().count();
        if !(3..=50).contains(&len) {
            return Err(AppError::Validation(
                "Username must be between 3 and 50 characters".into(),
            ));
        }
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, '_', '.' and '-'".into(),
            ));
        }
        if self.password.chars().count() < 6 {
            return Err(AppError::Validation(
                "Password must be at least 6 characters".into(),
            ));
        }
        if self.full_name.trim().is_empty() {
            return Err(AppError::Validation("Full name is required".into()));
        }
        Ok(())
    }
}

// Hash checked when there is no real one, so a miss costs as much as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-user-password").ok());

fn verify_against_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

const USER_COLUMNS: &str =
    "id, username, password_hash, full_name, role, is_active, created_at, updated_at";

impl User {
    pub async fn create(pool: &PgPool, req: &RegisterRequest) -> Result<Self, AppError> {
        let password_hash = hash_password(&req.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, password_hash, full_name, role, is_active)
            VALUES ($1, $2, $3, $4, $5, true)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&req.username)
        .bind(password_hash)
        .bind(&req.full_name)
        .bind(req.role.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Username already exists"))?;

        tracing::info!("Created user {} with role {}", user.username, user.role);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn exists_with_role(pool: &PgPool, role: Role) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role = $1)")
            .bind(role.as_str())
            .fetch_one(pool)
            .await
    }

    /// Checks credentials. Every failure collapses into the same `Unauthorized`.
    pub async fn authenticate(
        pool: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<Self, AppError> {
        let Some(user) = Self::find_by_username(pool, username).await? else {
            tracing::debug!("Login attempt for unknown user {}", username);
            verify_against_dummy(password);
            return Err(AppError::Unauthorized);
        };

        if !user.is_active {
            tracing::debug!("Login attempt for inactive user {}", username);
            verify_against_dummy(password);
            return Err(AppError::Unauthorized);
        }

        if !user.verify_login(password)? {
            tracing::debug!("Wrong password for user {}", username);
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Rebinds a token subject to a live account.
    pub async fn validate(pool: &PgPool, id: Uuid) -> Result<Self, AppError> {
        match Self::find_by_id(pool, id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AppError::Unauthorized),
        }
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }
}
