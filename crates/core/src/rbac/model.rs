//! Role and permission model definitions

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Role attached to an organization membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Viewer,
}

/// An action on a resource class that a role may grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    TaskCreate,
    TaskRead,
    TaskUpdate,
    TaskDelete,
    AuditRead,
}

const FULL_ACCESS: [Permission; 5] = [
    Permission::TaskCreate,
    Permission::TaskRead,
    Permission::TaskUpdate,
    Permission::TaskDelete,
    Permission::AuditRead,
];

const READ_ONLY: [Permission; 1] = [Permission::TaskRead];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }

    /// The fixed permission set held by this role.
    ///
    /// Owner and Admin currently hold identical sets; the ownership rule for
    /// task deletion is applied by the policy evaluator, not here.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Owner | Self::Admin => &FULL_ACCESS,
            Self::Viewer => &READ_ONLY,
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            _ => Err(Error::InvalidInput(format!(
                "Unsupported role '{}'",
                value
            ))),
        }
    }
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreate => "task-create",
            Self::TaskRead => "task-read",
            Self::TaskUpdate => "task-update",
            Self::TaskDelete => "task-delete",
            Self::AuditRead => "audit-read",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_admin_hold_full_access() {
        for role in [Role::Owner, Role::Admin] {
            for permission in FULL_ACCESS {
                assert!(role.grants(permission), "{:?} should grant {:?}", role, permission);
            }
        }
    }

    #[test]
    fn viewer_is_read_only() {
        assert!(Role::Viewer.grants(Permission::TaskRead));
        for permission in [
            Permission::TaskCreate,
            Permission::TaskUpdate,
            Permission::TaskDelete,
            Permission::AuditRead,
        ] {
            assert!(!Role::Viewer.grants(permission));
        }
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("manager".parse::<Role>().is_err());
    }
}
