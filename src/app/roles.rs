use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::permission::Permission;
use crate::domain::role::{Role, ADMINISTRATOR_ROLE, CANONICAL_ROLES};
use crate::infra::db::Db;

fn role_from_row(row: &PgRow) -> Role {
    Role {
        id: row.get("id"),
        name: row.get("name"),
        is_default: row.get("is_default"),
        permissions: Permission::from_stored_bits(row.get("permissions")),
    }
}

#[derive(Clone)]
pub struct RoleService {
    db: Db,
}

impl RoleService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Upserts the canonical roles and leaves `User` as the only default.
    /// Safe to run any number of times.
    pub async fn insert_roles(&self) -> Result<Vec<Role>> {
        let mut tx = self.db.pool().begin().await?;

        // Clear the flag first so the single-default index never sees two.
        sqlx::query("UPDATE roles SET is_default = FALSE WHERE is_default")
            .execute(&mut *tx)
            .await?;

        let mut roles = Vec::with_capacity(CANONICAL_ROLES.len());
        for bundle in CANONICAL_ROLES {
            let existing = sqlx::query(
                "SELECT id, name, is_default, permissions FROM roles WHERE name = $1 FOR UPDATE",
            )
            .bind(bundle.name)
            .fetch_optional(&mut *tx)
            .await?;

            let mut role = match existing {
                Some(row) => role_from_row(&row),
                None => Role::new(bundle.name),
            };
            bundle.apply(&mut role);

            let row = sqlx::query(
                "INSERT INTO roles (name, is_default, permissions) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (name) DO UPDATE \
                 SET is_default = EXCLUDED.is_default, permissions = EXCLUDED.permissions \
                 RETURNING id, name, is_default, permissions",
            )
            .bind(&role.name)
            .bind(role.is_default)
            .bind(role.permissions.bits())
            .fetch_one(&mut *tx)
            .await?;
            roles.push(role_from_row(&row));
        }

        tx.commit().await?;
        tracing::info!(count = roles.len(), "roles seeded");
        Ok(roles)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, is_default, permissions FROM roles ORDER BY permissions")
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(role_from_row).collect())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT id, name, is_default, permissions FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(role_from_row))
    }

    pub async fn default_role(&self) -> Result<Role> {
        let mut conn = self.db.pool().acquire().await?;
        resolve_role(&mut *conn, None).await
    }
}

/// Role for a new account: Administrator for the configured admin address,
/// otherwise the default role.
pub(crate) async fn resolve_role(
    conn: &mut sqlx::PgConnection,
    admin_name: Option<&str>,
) -> Result<Role> {
    let row = match admin_name {
        Some(name) => {
            sqlx::query("SELECT id, name, is_default, permissions FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("SELECT id, name, is_default, permissions FROM roles WHERE is_default")
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    row.as_ref()
        .map(role_from_row)
        .ok_or_else(|| anyhow!("role not seeded: {}", admin_name.unwrap_or("default")))
}

pub(crate) fn role_for_email(email: &str, admin_email: Option<&str>) -> Option<&'static str> {
    match admin_email {
        Some(admin) if admin == email => Some(ADMINISTRATOR_ROLE),
        _ => None,
    }
}
