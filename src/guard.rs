//! Authorization policy.
//!
//! Pure functions only: given a role (and caller id) decide whether an action is allowed
//! and how far a todo query must be narrowed. Stores apply the resulting `TodoScope`;
//! mutations additionally pin `user_id = caller` inside the statement itself.

use crate::{error::AppError, models::Role};

/// What a caller is trying to do with todos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// How a todo query is narrowed for a given caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoScope {
    /// Only rows whose `user_id` equals the wrapped id
    Owner(i64),
    /// No restriction (admin reads)
    All,
}

impl TodoScope {
    pub fn permits(&self, owner_id: i64) -> bool {
        match self {
            TodoScope::Owner(id) => *id == owner_id,
            TodoScope::All => true,
        }
    }
}

/// Read scope for a caller: users see their own rows, admins see everything.
pub fn scope(role: Role, user_id: i64) -> TodoScope {
    match role {
        Role::User => TodoScope::Owner(user_id),
        Role::Admin => TodoScope::All,
    }
}

/// Role/action policy table. Admins are read-only; users may do everything on their own rows.
pub fn is_allowed(role: Role, action: Action) -> bool {
    match (role, action) {
        (_, Action::Read) => true,
        (Role::User, Action::Create | Action::Update | Action::Delete) => true,
        (Role::Admin, Action::Create | Action::Update | Action::Delete) => false,
    }
}

pub fn authorize(role: Role, action: Action) -> Result<(), AppError> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
