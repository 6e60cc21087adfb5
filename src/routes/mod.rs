/// Router Module Index
///
/// Organizes routing into access-segregated modules. Each module maps to one gate
/// applied in `create_router`:
///
/// - `public`: no authentication (health, docs, register, login).
/// - `user`: valid session token with `role = user`.
/// - `admin`: valid session token with `role = admin`, read-only.
pub mod public;

/// Routes protected by `auth::require_user`.
pub mod user;

/// Routes protected by `auth::require_admin`.
pub mod admin;
