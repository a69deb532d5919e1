use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::permission::Permission;
use crate::domain::role::Role;
use crate::domain::user::{Account, PublicUser, User};
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str = "u.id, u.email, u.username, u.role_id, u.confirmed, \
     u.name, u.location, u.about_me, u.avatar_hash, u.member_since, u.last_seen";

pub(crate) const ACCOUNT_COLUMNS: &str = "u.id, u.email, u.username, u.role_id, u.confirmed, \
     u.name, u.location, u.about_me, u.avatar_hash, u.member_since, u.last_seen, \
     r.name AS role_name, r.is_default AS role_is_default, r.permissions AS role_permissions";

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        role_id: row.get("role_id"),
        confirmed: row.get("confirmed"),
        name: row.get("name"),
        location: row.get("location"),
        about_me: row.get("about_me"),
        avatar_hash: row.get("avatar_hash"),
        member_since: row.get("member_since"),
        last_seen: row.get("last_seen"),
    }
}

pub(crate) fn account_from_row(row: &PgRow) -> Account {
    let user = user_from_row(row);
    let role = Role {
        id: user.role_id,
        name: row.get("role_name"),
        is_default: row.get("role_is_default"),
        permissions: Permission::from_stored_bits(row.get("role_permissions")),
    };
    Account { user, role }
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users u WHERE u.id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users u WHERE u.email = $1",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Public projection with post and follow counts. Self-follows are not
    /// counted.
    pub async fn get_public_user(&self, user_id: Uuid) -> Result<Option<PublicUser>> {
        let row = sqlx::query(&format!(
            "SELECT {}, \
                (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS post_count, \
                (SELECT COUNT(*) FROM follows f \
                 WHERE f.followed_id = u.id AND f.follower_id <> u.id) AS followers_count, \
                (SELECT COUNT(*) FROM follows f \
                 WHERE f.follower_id = u.id AND f.followed_id <> u.id) AS following_count \
             FROM users u WHERE u.id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let user = row.map(|row| {
            let mut public = PublicUser::from(user_from_row(&row));
            public.post_count = row.get("post_count");
            public.followers_count = row.get("followers_count");
            public.following_count = row.get("following_count");
            public
        });

        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users u \
             SET name = COALESCE($2, u.name), \
                 location = COALESCE($3, u.location), \
                 about_me = COALESCE($4, u.about_me) \
             WHERE u.id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.name)
        .bind(update.location)
        .bind(update.about_me)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Refreshes `last_seen` and returns the account with its role.
    pub async fn ping(&self, user_id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "WITH touched AS ( \
                UPDATE users SET last_seen = now() WHERE id = $1 RETURNING * \
             ) \
             SELECT {} FROM touched u JOIN roles r ON r.id = u.role_id",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }
}
