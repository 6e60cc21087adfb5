use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
    response::IntoResponse,
};
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use todo_api::{
    AppConfig, AppError, AppState, MemoryRepository,
    auth::AuthUser,
    models::{Role, UserSummary},
    password::{hash_password, verify_dummy, verify_password},
    token::{self, Claims, TokenError},
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn alice() -> UserSummary {
    UserSummary {
        id: 7,
        username: "alice".to_string(),
        role: Role::User,
    }
}

fn create_app_state(jwt_secret: &str) -> AppState {
    let config = AppConfig {
        jwt_secret: jwt_secret.to_string(),
        ..AppConfig::default()
    };
    AppState {
        repo: Arc::new(MemoryRepository::new()),
        config,
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri, bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = bearer {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let (parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();
    parts
}

async fn extract(state: &AppState, authorization: Option<&str>) -> Result<AuthUser, AppError> {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap(), authorization);
    AuthUser::from_request_parts(&mut parts, state).await
}

// --- Password Hasher ---

#[test]
fn test_password_hash_and_verify_correct() {
    let hash = hash_password("pw1").unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password("pw1", &hash).unwrap());
}

#[test]
fn test_password_verify_wrong_is_false_not_error() {
    let hash = hash_password("correct-password").unwrap();
    for candidate in ["wrong-password", "", "correct-password ", "CORRECT-PASSWORD"] {
        assert!(!verify_password(candidate, &hash).unwrap(), "{candidate:?}");
    }
}

#[test]
fn test_password_different_salts() {
    let hash1 = hash_password("same-password").unwrap();
    let hash2 = hash_password("same-password").unwrap();
    assert_ne!(hash1, hash2);
    assert!(verify_password("same-password", &hash1).unwrap());
    assert!(verify_password("same-password", &hash2).unwrap());
}

#[test]
fn test_password_malformed_hash_is_error() {
    assert!(verify_password("pw", "not-a-phc-string").is_err());
}

#[test]
fn test_password_dummy_verification_does_real_work() {
    // Any input runs a full argon2 verification and never errors.
    for candidate in ["", "pw1", "unknown-user-placeholder"] {
        assert!(verify_dummy(candidate).is_ok(), "{candidate:?}");
    }
}

// --- Token Issuer/Verifier ---

#[test]
fn test_token_valid_until_one_second_before_expiry() {
    let issued_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let ttl = Duration::hours(24);
    let jwt = token::issue_at(&alice(), TEST_JWT_SECRET, ttl, issued_at).unwrap();

    let expiry = issued_at + ttl;
    let claims = token::verify_at(&jwt, TEST_JWT_SECRET, expiry - Duration::seconds(1)).unwrap();

    assert_eq!(
        claims,
        Claims {
            sub: 7,
            username: "alice".to_string(),
            role: Role::User,
            iat: issued_at.timestamp(),
            exp: expiry.timestamp(),
        }
    );
}

#[test]
fn test_token_expired_at_and_after_expiry() {
    let issued_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let ttl = Duration::hours(24);
    let jwt = token::issue_at(&alice(), TEST_JWT_SECRET, ttl, issued_at).unwrap();

    let expiry = issued_at + ttl;
    assert_eq!(
        token::verify_at(&jwt, TEST_JWT_SECRET, expiry),
        Err(TokenError::Expired)
    );
    assert_eq!(
        token::verify_at(&jwt, TEST_JWT_SECRET, expiry + Duration::seconds(1)),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_token_issue_with_unrepresentable_expiry_is_error() {
    let issued_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let result = token::issue_at(&alice(), TEST_JWT_SECRET, Duration::MAX, issued_at);
    assert!(matches!(result, Err(TokenError::Signing(_))));
}

#[test]
fn test_token_wrong_secret_is_invalid_not_expired() {
    let issued_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let jwt = token::issue_at(&alice(), "secret-1", Duration::hours(24), issued_at).unwrap();

    // Even long after expiry, a bad signature reports Invalid.
    let result = token::verify_at(&jwt, "secret-2", issued_at + Duration::days(30));
    assert!(matches!(result, Err(TokenError::Invalid(_))));
}

#[test]
fn test_token_tampered_payload_is_invalid() {
    let jwt = token::issue(&alice(), TEST_JWT_SECRET, Duration::hours(24)).unwrap();
    let admin_jwt = token::issue(
        &UserSummary {
            role: Role::Admin,
            ..alice()
        },
        TEST_JWT_SECRET,
        Duration::hours(24),
    )
    .unwrap();

    // Splice the admin payload onto the user signature.
    let parts: Vec<&str> = jwt.split('.').collect();
    let admin_parts: Vec<&str> = admin_jwt.split('.').collect();
    let forged = format!("{}.{}.{}", parts[0], admin_parts[1], parts[2]);

    assert!(matches!(
        token::verify(&forged, TEST_JWT_SECRET),
        Err(TokenError::Invalid(_))
    ));
}

#[test]
fn test_token_garbage_is_invalid() {
    assert!(matches!(
        token::verify("not.a.jwt", TEST_JWT_SECRET),
        Err(TokenError::Invalid(_))
    ));
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let state = create_app_state(TEST_JWT_SECRET);
    let jwt = token::issue(&alice(), TEST_JWT_SECRET, Duration::hours(1)).unwrap();

    let user = extract(&state, Some(&format!("Bearer {jwt}"))).await.unwrap();

    assert_eq!(
        user,
        AuthUser {
            id: 7,
            username: "alice".to_string(),
            role: Role::User,
        }
    );
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let state = create_app_state(TEST_JWT_SECRET);

    let err = extract(&state, None).await.unwrap_err();

    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_without_bearer_prefix() {
    let state = create_app_state(TEST_JWT_SECRET);
    let jwt = token::issue(&alice(), TEST_JWT_SECRET, Duration::hours(1)).unwrap();

    let err = extract(&state, Some(&jwt)).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

    let err = extract(&state, Some("Bearer ")).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let state = create_app_state(TEST_JWT_SECRET);
    let now = Utc::now().timestamp();

    // Hand-built so the token is correctly signed but already past `exp`.
    let claims = Claims {
        sub: 7,
        username: "alice".to_string(),
        role: Role::User,
        iat: now - 7200,
        exp: now - 3600,
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let err = extract(&state, Some(&format!("Bearer {jwt}"))).await.unwrap_err();

    assert!(matches!(err, AppError::Unauthenticated("Token expired")));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_foreign_secret() {
    let state = create_app_state(TEST_JWT_SECRET);
    let jwt = token::issue(&alice(), "some-other-secret", Duration::hours(1)).unwrap();

    let err = extract(&state, Some(&format!("Bearer {jwt}"))).await.unwrap_err();

    assert!(matches!(err, AppError::Unauthenticated("Invalid token")));
}
