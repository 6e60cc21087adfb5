use crate::{
    guard::TodoScope,
    models::{CreateTodoRequest, NewUser, Todo, UpdateTodoRequest, User},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, postgres::PgPoolOptions, query_builder::QueryBuilder};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

/// Persistence failures the handlers need to tell apart.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The `users.username` unique constraint rejected the insert.
    #[error("username already exists")]
    DuplicateUsername,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable (and so are the mocks in the test suite).
///
/// Ownership is enforced here as well as in the handlers: every mutation takes the
/// caller's id and only touches a row whose `user_id` matches it.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    // Fails with `RepoError::DuplicateUsername` when the name is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    // --- Resource Store ---
    async fn create_todo(&self, owner_id: i64, req: CreateTodoRequest) -> Result<Todo, RepoError>;
    // Reads are narrowed by the scope computed in `guard::scope`.
    async fn list_todos(&self, scope: TodoScope) -> Result<Vec<Todo>, RepoError>;
    async fn get_todo(&self, id: i64, scope: TodoScope) -> Result<Option<Todo>, RepoError>;
    // Owner-Only: `None` when the row is missing or belongs to someone else.
    async fn update_todo(
        &self,
        id: i64,
        owner_id: i64,
        patch: UpdateTodoRequest,
    ) -> Result<Option<Todo>, RepoError>;
    // Owner-Only, permanent. `false` when nothing matched.
    async fn delete_todo(&self, id: i64, owner_id: i64) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

const TODO_COLUMNS: &str =
    "id, user_id, judul, deskripsi, kategori, priority, is_completed, created_at, updated_at";

const SELECT_TODOS_WITH_OWNER: &str = r#"
    SELECT
        t.id, t.user_id, t.judul, t.deskripsi, t.kategori, t.priority,
        t.is_completed, t.created_at, t.updated_at,
        u.username AS owner_username
    FROM todos t
    JOIN users u ON u.id = t.user_id
    WHERE TRUE
"#;

/// PostgresRepository
///
/// The production implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using an initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `db_url`.
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations (`./migrations`).
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Base todo query with the scope restriction applied; callers append further filters.
    fn scoped_select(scope: TodoScope) -> QueryBuilder<'static, Postgres> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_TODOS_WITH_OWNER);
        if let TodoScope::Owner(owner_id) = scope {
            builder.push(" AND t.user_id = ");
            builder.push_bind(owner_id);
        }
        builder
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Relies on the `UNIQUE` constraint rather than a prior lookup, so two concurrent
    /// registrations of the same name cannot both succeed.
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::DuplicateUsername,
            _ => RepoError::Database(e),
        })
    }

    async fn create_todo(&self, owner_id: i64, req: CreateTodoRequest) -> Result<Todo, RepoError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"INSERT INTO todos (user_id, judul, deskripsi, kategori, priority, is_completed)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {TODO_COLUMNS}"#
        ))
        .bind(owner_id)
        .bind(&req.judul)
        .bind(&req.deskripsi)
        .bind(req.kategori.as_str())
        .bind(req.priority.as_str())
        .bind(req.is_completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn list_todos(&self, scope: TodoScope) -> Result<Vec<Todo>, RepoError> {
        let mut builder = Self::scoped_select(scope);
        builder.push(" ORDER BY t.id ASC");
        let todos = builder
            .build_query_as::<Todo>()
            .fetch_all(&self.pool)
            .await?;
        Ok(todos)
    }

    async fn get_todo(&self, id: i64, scope: TodoScope) -> Result<Option<Todo>, RepoError> {
        let mut builder = Self::scoped_select(scope);
        builder.push(" AND t.id = ");
        builder.push_bind(id);
        let todo = builder
            .build_query_as::<Todo>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(todo)
    }

    /// update_todo
    ///
    /// `COALESCE` keeps the stored value for every field the patch leaves as `None`.
    /// The ownership check and the write are the same statement.
    async fn update_todo(
        &self,
        id: i64,
        owner_id: i64,
        patch: UpdateTodoRequest,
    ) -> Result<Option<Todo>, RepoError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"
            UPDATE todos
            SET judul = COALESCE($3, judul),
                deskripsi = COALESCE($4, deskripsi),
                kategori = COALESCE($5, kategori),
                priority = COALESCE($6, priority),
                is_completed = COALESCE($7, is_completed),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(patch.judul)
        .bind(patch.deskripsi)
        .bind(patch.kategori.map(|k| k.as_str()))
        .bind(patch.priority.map(|p| p.as_str()))
        .bind(patch.is_completed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    /// delete_todo
    ///
    /// Hard delete. `deleted_at` exists in the schema but is never consulted.
    async fn delete_todo(&self, id: i64, owner_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    todos: BTreeMap<i64, Todo>,
    next_user_id: i64,
    next_todo_id: i64,
}

impl Tables {
    fn with_owner(&self, todo: &Todo) -> Todo {
        let mut todo = todo.clone();
        todo.owner_username = self.users.get(&todo.user_id).map(|u| u.username.clone());
        todo
    }
}

/// MemoryRepository
///
/// Process-local store with the same contracts as `PostgresRepository`: serial ids
/// starting at 1, unique usernames, owner-pinned mutations. Used when no
/// `DATABASE_URL` is configured locally, and as a real backend in the test suite.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::DuplicateUsername);
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_todo(&self, owner_id: i64, req: CreateTodoRequest) -> Result<Todo, RepoError> {
        let mut tables = self.tables.write().await;
        tables.next_todo_id += 1;
        let now = Utc::now();
        let todo = Todo {
            id: tables.next_todo_id,
            user_id: owner_id,
            judul: req.judul,
            deskripsi: req.deskripsi,
            kategori: req.kategori,
            priority: req.priority,
            is_completed: req.is_completed,
            created_at: now,
            updated_at: now,
            owner_username: None,
        };
        tables.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn list_todos(&self, scope: TodoScope) -> Result<Vec<Todo>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .todos
            .values()
            .filter(|t| scope.permits(t.user_id))
            .map(|t| tables.with_owner(t))
            .collect())
    }

    async fn get_todo(&self, id: i64, scope: TodoScope) -> Result<Option<Todo>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .todos
            .get(&id)
            .filter(|t| scope.permits(t.user_id))
            .map(|t| tables.with_owner(t)))
    }

    async fn update_todo(
        &self,
        id: i64,
        owner_id: i64,
        patch: UpdateTodoRequest,
    ) -> Result<Option<Todo>, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(todo) = tables
            .todos
            .get_mut(&id)
            .filter(|t| t.user_id == owner_id)
        else {
            return Ok(None);
        };

        if let Some(judul) = patch.judul {
            todo.judul = judul;
        }
        if let Some(deskripsi) = patch.deskripsi {
            todo.deskripsi = deskripsi;
        }
        if let Some(kategori) = patch.kategori {
            todo.kategori = kategori;
        }
        if let Some(priority) = patch.priority {
            todo.priority = priority;
        }
        if let Some(is_completed) = patch.is_completed {
            todo.is_completed = is_completed;
        }
        todo.updated_at = Utc::now();

        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, id: i64, owner_id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let owned = tables.todos.get(&id).is_some_and(|t| t.user_id == owner_id);
        if owned {
            tables.todos.remove(&id);
        }
        Ok(owned)
    }
}
