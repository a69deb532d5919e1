use serde::Serialize;
use uuid::Uuid;

use crate::domain::permission::Permission;

pub const DEFAULT_ROLE: &str = "User";
pub const MODERATOR_ROLE: &str = "Moderator";
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub permissions: Permission,
}

impl Role {
    /// An unsaved role with no permissions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            is_default: false,
            permissions: Permission::none(),
        }
    }

    pub fn with_permissions(name: impl Into<String>, permissions: Permission) -> Self {
        Self {
            permissions,
            ..Self::new(name)
        }
    }

    pub fn add_permission(&mut self, permission: Permission) {
        self.permissions |= permission;
    }

    pub fn remove_permission(&mut self, permission: Permission) {
        self.permissions &= !permission;
    }

    pub fn reset_permissions(&mut self) {
        self.permissions = Permission::none();
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions & permission == permission
    }

    pub fn is_administrator(&self) -> bool {
        self.has_permission(Permission::Admin)
    }
}

/// One of the named permission bundles seeded into every deployment.
#[derive(Debug, Clone, Copy)]
pub struct RoleBundle {
    pub name: &'static str,
    pub permissions: &'static [Permission],
}

impl RoleBundle {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ROLE
    }

    /// Resets `role` and rebuilds it from this bundle.
    pub fn apply(&self, role: &mut Role) {
        role.reset_permissions();
        for permission in self.permissions {
            role.add_permission(*permission);
        }
        role.is_default = self.is_default();
    }
}

/// Each bundle is a strict superset of the one before it.
pub const CANONICAL_ROLES: [RoleBundle; 3] = [
    RoleBundle {
        name: DEFAULT_ROLE,
        permissions: &[
            Permission::Follow,
            Permission::Comment,
            Permission::WriteArticles,
        ],
    },
    RoleBundle {
        name: MODERATOR_ROLE,
        permissions: &[
            Permission::Follow,
            Permission::Comment,
            Permission::WriteArticles,
            Permission::Moderate,
        ],
    },
    RoleBundle {
        name: ADMINISTRATOR_ROLE,
        permissions: &[
            Permission::Follow,
            Permission::Comment,
            Permission::WriteArticles,
            Permission::Moderate,
            Permission::Admin,
        ],
    },
];
