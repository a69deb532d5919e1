use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::permission::Permission;
use crate::domain::role::Role;

const GRAVATAR_BASE: &str = "https://secure.gravatar.com/avatar/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role_id: Uuid,
    pub confirmed: bool,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    #[serde(skip_serializing)]
    pub avatar_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

impl User {
    /// Gravatar URL for this user; `default` is the fallback image style and
    /// `rating` the maximum content rating.
    pub fn gravatar(&self, size: u32, default: &str, rating: &str) -> String {
        gravatar_url(&self.avatar_hash, size, default, rating)
    }
}

/// A user together with the role that grants its permissions.
#[derive(Debug, Clone)]
pub struct Account {
    pub user: User,
    pub role: Role,
}

impl Account {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn is_administrator(&self) -> bool {
        self.role.is_administrator()
    }
}

/// Hash of the normalized email, stored alongside it and refreshed whenever
/// the email changes.
pub fn avatar_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

pub fn gravatar_url(hash: &str, size: u32, default: &str, rating: &str) -> String {
    let base = format!("{}{}", GRAVATAR_BASE, hash);
    let size = size.to_string();
    match url::Url::parse_with_params(&base, [("s", size.as_str()), ("d", default), ("r", rating)]) {
        Ok(url) => url.to_string(),
        Err(_) => base,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub avatar_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub post_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            location: user.location.clone(),
            about_me: user.about_me.clone(),
            avatar_url: user.gravatar(100, "identicon", "g"),
            member_since: user.member_since,
            last_seen: user.last_seen,
            post_count: 0,
            followers_count: 0,
            following_count: 0,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}
