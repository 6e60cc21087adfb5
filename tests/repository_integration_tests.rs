use sqlx::PgPool;
use std::sync::Arc;
use tokio::test;
use todo_api::{
    guard::TodoScope,
    models::{Category, CreateTodoRequest, NewUser, Priority, Role, UpdateTodoRequest, User},
    repository::{MemoryRepository, PostgresRepository, RepoError, Repository},
};

// --- Test Data Helpers ---

fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
    }
}

fn new_todo(judul: &str) -> CreateTodoRequest {
    CreateTodoRequest {
        judul: judul.to_string(),
        deskripsi: "details".to_string(),
        kategori: Category::General,
        priority: Priority::Medium,
        is_completed: false,
    }
}

async fn seed_users(repo: &dyn Repository, prefix: &str) -> (User, User) {
    let alice = repo
        .create_user(new_user(&format!("{prefix}alice"), Role::User))
        .await
        .unwrap();
    let bob = repo
        .create_user(new_user(&format!("{prefix}bob"), Role::User))
        .await
        .unwrap();
    (alice, bob)
}

// --- Shared Contract ---
//
// Each check runs against any `Repository`; the Postgres variants below reuse them.

async fn check_unique_usernames(repo: &dyn Repository, prefix: &str) {
    let name = format!("{prefix}carol");
    let created = repo.create_user(new_user(&name, Role::Admin)).await.unwrap();
    assert_eq!(created.role, Role::Admin);

    let duplicate = repo
        .create_user(NewUser {
            password_hash: "$argon2id$other".to_string(),
            ..new_user(&name, Role::User)
        })
        .await;
    assert!(matches!(duplicate, Err(RepoError::DuplicateUsername)));

    // The first registration is left exactly as it was.
    let found = repo.find_user_by_username(&name).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.role, Role::Admin);
    assert_eq!(found.password_hash, created.password_hash);
    assert!(repo
        .find_user_by_username(&format!("{prefix}nobody"))
        .await
        .unwrap()
        .is_none());
}

async fn check_read_scopes(repo: &dyn Repository, prefix: &str) {
    let (alice, bob) = seed_users(repo, prefix).await;
    let a = repo.create_todo(alice.id, new_todo("alice task")).await.unwrap();
    let b = repo.create_todo(bob.id, new_todo("bob task")).await.unwrap();

    let own = repo.list_todos(TodoScope::Owner(alice.id)).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, a.id);
    assert_eq!(own[0].owner_username.as_deref(), Some(alice.username.as_str()));

    let all = repo.list_todos(TodoScope::All).await.unwrap();
    assert!(all.iter().any(|t| t.id == a.id));
    assert!(all.iter().any(|t| t.id == b.id));

    assert!(repo.get_todo(b.id, TodoScope::Owner(alice.id)).await.unwrap().is_none());
    let fetched = repo.get_todo(b.id, TodoScope::All).await.unwrap().unwrap();
    assert_eq!(fetched.judul, "bob task");
    assert_eq!(fetched.owner_username.as_deref(), Some(bob.username.as_str()));
}

async fn check_owner_pinned_mutations(repo: &dyn Repository, prefix: &str) {
    let (alice, bob) = seed_users(repo, prefix).await;
    let todo = repo.create_todo(alice.id, new_todo("original")).await.unwrap();

    // Someone else's id matches nothing.
    let hijack = UpdateTodoRequest {
        judul: Some("hijacked".to_string()),
        ..UpdateTodoRequest::default()
    };
    assert!(repo.update_todo(todo.id, bob.id, hijack).await.unwrap().is_none());
    assert!(!repo.delete_todo(todo.id, bob.id).await.unwrap());

    // Partial update leaves absent fields untouched.
    let patch = UpdateTodoRequest {
        priority: Some(Priority::High),
        is_completed: Some(true),
        ..UpdateTodoRequest::default()
    };
    let updated = repo
        .update_todo(todo.id, alice.id, patch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.judul, "original");
    assert_eq!(updated.deskripsi, "details");
    assert_eq!(updated.kategori, Category::General);
    assert_eq!(updated.priority, Priority::High);
    assert!(updated.is_completed);
    assert!(updated.updated_at >= todo.updated_at);

    assert!(repo.delete_todo(todo.id, alice.id).await.unwrap());
    assert!(repo.get_todo(todo.id, TodoScope::All).await.unwrap().is_none());
    assert!(!repo.delete_todo(todo.id, alice.id).await.unwrap());
}

// --- In-Memory Store ---

#[test]
async fn test_memory_unique_usernames() {
    check_unique_usernames(&MemoryRepository::new(), "").await;
}

#[test]
async fn test_memory_read_scopes() {
    check_read_scopes(&MemoryRepository::new(), "").await;
}

#[test]
async fn test_memory_owner_pinned_mutations() {
    check_owner_pinned_mutations(&MemoryRepository::new(), "").await;
}

#[test]
async fn test_memory_ids_start_at_one() {
    let repo = MemoryRepository::new();
    let (alice, bob) = seed_users(&repo, "").await;
    assert_eq!((alice.id, bob.id), (1, 2));

    let first = repo.create_todo(alice.id, new_todo("first")).await.unwrap();
    let second = repo.create_todo(bob.id, new_todo("second")).await.unwrap();
    assert_eq!((first.id, second.id), (1, 2));

    // Deleted ids are not reused.
    assert!(repo.delete_todo(second.id, bob.id).await.unwrap());
    let third = repo.create_todo(bob.id, new_todo("third")).await.unwrap();
    assert_eq!(third.id, 3);
}

#[test]
async fn test_memory_concurrent_registration_admits_one() {
    let repo = Arc::new(MemoryRepository::new());
    let attempts = (0..8).map(|_| {
        let repo = repo.clone();
        tokio::spawn(async move { repo.create_user(new_user("dup", Role::User)).await })
    });

    let mut created = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap().is_ok() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

// --- Postgres Store ---
//
// Needs a reachable database: `DATABASE_URL=... cargo test -- --ignored`.

async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run Postgres integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    let repo = PostgresRepository::new(pool);
    repo.migrate().await.expect("Failed to run database migrations.");
    repo
}

/// Usernames are unique per table, so every run gets its own prefix.
fn unique_prefix() -> String {
    format!("t{}_", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[test]
#[ignore]
async fn test_postgres_unique_usernames() {
    check_unique_usernames(&postgres().await, &unique_prefix()).await;
}

#[test]
#[ignore]
async fn test_postgres_read_scopes() {
    check_read_scopes(&postgres().await, &unique_prefix()).await;
}

#[test]
#[ignore]
async fn test_postgres_owner_pinned_mutations() {
    check_owner_pinned_mutations(&postgres().await, &unique_prefix()).await;
}
