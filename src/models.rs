use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AppError;

// --- Closed Vocabularies ---

/// Raised when a stored or submitted string is outside one of the closed enums below.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Role
///
/// The caller's RBAC role. Fixed at registration and carried inside every session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    User,
    Admin,
}

/// Category
///
/// The fixed set of buckets a todo can be filed under (`kategori`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Category {
    General,
    Work,
    Personal,
    Shopping,
    Education,
    Health,
}

/// Priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Shopping => "Shopping",
            Category::Education => "Education",
            Category::Health => "Health",
        }
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "General" => Ok(Category::General),
            "Work" => Ok(Category::Work),
            "Personal" => Ok(Category::Personal),
            "Shopping" => Ok(Category::Shopping),
            "Education" => Ok(Category::Education),
            "Health" => Ok(Category::Health),
            other => Err(UnknownVariant {
                kind: "kategori",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(UnknownVariant {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

// Text columns are decoded through these when sqlx builds rows (`#[sqlx(try_from = "String")]`).
impl TryFrom<String> for Role {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Category {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Priority {
    type Error = UnknownVariant;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. Never serialized directly: the password hash must not
/// leave the service. Use `UserSummary` for responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    // Unique, enforced by the database constraint.
    pub username: String,
    // argon2id PHC string.
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to the credential store; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Todo
///
/// A row of the `todos` table. Every todo has exactly one owner (`user_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Todo {
    pub id: i64,
    // FK to users.id (Owner).
    pub user_id: i64,
    pub judul: String,
    pub deskripsi: String,
    #[sqlx(try_from = "String")]
    pub kategori: Category,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub is_completed: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,

    // Loaded via a JOIN on list/get reads only.
    #[sqlx(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`. `role` must be `user` or `admin`;
/// anything else is rejected during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// CreateTodoRequest
///
/// Input payload for `POST /api/user/todos`. The owner is always the caller and is
/// never accepted from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateTodoRequest {
    pub judul: String,
    #[serde(default)]
    pub deskripsi: String,
    pub kategori: Category,
    pub priority: Priority,
    #[serde(default)]
    pub is_completed: bool,
}

/// UpdateTodoRequest
///
/// Partial update payload for `PUT /api/user/todos/{id}`. Only the fields that are
/// present overwrite the stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateTodoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judul: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deskripsi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kategori: Option<Category>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("username", &self.username)?;
        require_text("password", &self.password)
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("username", &self.username)?;
        require_text("password", &self.password)
    }
}

impl CreateTodoRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("judul", &self.judul)
    }
}

impl UpdateTodoRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.judul {
            Some(judul) => require_text("judul", judul),
            None => Ok(()),
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

// --- Response Schemas (Output) ---

/// UserSummary
///
/// The public view of a user: what register and login hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

/// TodoResponse
///
/// Single-todo envelope. `message` is present on create and update, absent on reads.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TodoResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub todo: Todo,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TodoListResponse {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// ErrorResponse
///
/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}
