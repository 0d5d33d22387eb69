//! Capability checks on an authenticated [`Principal`].
//!
//! Each check is a plain predicate returning `Result<(), Forbidden>`, so
//! callers combine them with `or_else` / `and_then` instead of nesting role
//! logic inside each operation.

use thiserror::Error;

use crate::db::School;
use crate::domain::{AccountId, Principal, Role};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Forbidden")]
pub struct Forbidden;

pub fn require_role(principal: &Principal, role: Role) -> Result<(), Forbidden> {
    if principal.role == role {
        Ok(())
    } else {
        Err(Forbidden)
    }
}

pub fn require_account(principal: &Principal, account_id: AccountId) -> Result<(), Forbidden> {
    if principal.account_id == account_id {
        Ok(())
    } else {
        Err(Forbidden)
    }
}

/// A leader acting on a school they own.
pub fn require_school_leader(principal: &Principal, school: &School) -> Result<(), Forbidden> {
    require_role(principal, Role::Leader).and_then(|()| require_account(principal, school.leader_id))
}

/// Who may approve or reject applications to `school`.
pub fn require_reviewer(principal: &Principal, school: &School) -> Result<(), Forbidden> {
    require_role(principal, Role::Admin).or_else(|_| require_school_leader(principal, school))
}
