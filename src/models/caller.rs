//! Authenticated caller identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{allocation::Actor, employee::normalize_department};
use crate::error::AppError;

text_enum! {
    /// Access role assigned in `user_roles`
    pub enum Role {
        /// Unrestricted
        Admin => "admin",
        /// Scoped to the department in their profile
        Coordinator => "coordinator",
    }
}

/// Claims read from tokens issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id in the identity provider
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

/// Role and profile rows for one identity-provider user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerProfile {
    pub role: Option<Role>,
    pub name: Option<String>,
    pub department: Option<String>,
}

/// Caller identity resolved once per request
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub name: Option<String>,
    pub department: Option<String>,
    /// Normalized department, `None` when the profile has no usable department
    pub department_key: Option<String>,
}

impl Caller {
    pub fn new(
        user_id: Uuid,
        email: Option<String>,
        role: Role,
        name: Option<String>,
        department: Option<String>,
    ) -> Self {
        let department_key = department
            .as_deref()
            .map(normalize_department)
            .filter(|key| !key.is_empty());
        Self {
            user_id,
            email,
            role,
            name,
            department,
            department_key,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator privileges required".to_string()))
        }
    }

    /// Actor recorded on ledger writes; falls back to the e-mail when the
    /// profile has no display name
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user_id,
            name: self.name.clone().or_else(|| self.email.clone()),
        }
    }
}
