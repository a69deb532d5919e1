use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::roles::{resolve_role, role_for_email};
use crate::app::tokens::AccountTokens;
use crate::app::users::{user_from_row, UserService, USER_COLUMNS};
use crate::domain::user::{avatar_hash, Account};
use crate::infra::db::{unique_violation, Db};
use crate::infra::mail::{MailKind, Mailer, OutgoingMail};

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailChangeRequest {
    Sent,
    InvalidPassword,
    EmailTaken,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    tokens: AccountTokens,
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
}

impl AuthService {
    pub fn new(
        db: Db,
        tokens: AccountTokens,
        mailer: Arc<dyn Mailer>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            admin_email,
        }
    }

    /// Creates the account with its role and self-follow in one transaction,
    /// then mails a confirmation token.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<Account> {
        let email = email.trim().to_lowercase();
        let password_hash = hash_password(password)?;

        let mut tx = self.db.pool().begin().await?;

        let admin_role = role_for_email(&email, self.admin_email.as_deref());
        let role = resolve_role(&mut *tx, admin_role).await?;

        let row = sqlx::query(&format!(
            "INSERT INTO users AS u (email, username, password_hash, role_id, avatar_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(username.trim())
        .bind(password_hash)
        .bind(role.id)
        .bind(avatar_hash(&email))
        .fetch_one(&mut *tx)
        .await?;
        let user = user_from_row(&row);

        sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES ($1, $1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %role.name, "account registered");
        self.send_confirmation(&user.email, user.id)?;

        Ok(Account { user, role })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let token = self.tokens.generate_access_token(user_id)?;
        Ok(Some(AccessToken {
            token,
            expires_at: OffsetDateTime::now_utc() + self.tokens.access_ttl(),
        }))
    }

    /// Account behind a bearer token; also refreshes its `last_seen`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<Account>> {
        let user_id = match self.tokens.authenticate(token) {
            Some(user_id) => user_id,
            None => return Ok(None),
        };
        UserService::new(self.db.clone()).ping(user_id).await
    }

    pub fn send_confirmation(&self, email: &str, user_id: Uuid) -> Result<()> {
        let token = self.tokens.generate_confirmation_token(user_id)?;
        self.mailer.send(OutgoingMail {
            to: email.to_string(),
            kind: MailKind::ConfirmAccount,
            token,
        });
        Ok(())
    }

    /// Marks the account confirmed when `token` was issued to it.
    pub async fn confirm(&self, user_id: Uuid, token: &str, expiration: Duration) -> Result<bool> {
        if !self.tokens.confirms(user_id, token, expiration) {
            return Ok(false);
        }

        let result = sqlx::query("UPDATE users SET confirmed = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let current_hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        let current_hash = match current_hash {
            Some(hash) => hash,
            None => return Ok(false),
        };
        if !verify_password(current_password, &current_hash)? {
            return Ok(false);
        }

        self.store_password(user_id, new_password).await
    }

    /// Mails a reset token when the address belongs to an account. Unknown
    /// addresses are silently ignored.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let user = UserService::new(self.db.clone()).find_by_email(email).await?;
        if let Some(user) = user {
            let token = self.tokens.generate_reset_token(user.id)?;
            self.mailer.send(OutgoingMail {
                to: user.email,
                kind: MailKind::ResetPassword,
                token,
            });
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        expiration: Duration,
    ) -> Result<bool> {
        let user_id = match self.tokens.reset_subject(token, expiration) {
            Some(user_id) => user_id,
            None => return Ok(false),
        };
        self.store_password(user_id, new_password).await
    }

    pub async fn request_email_change(
        &self,
        user_id: Uuid,
        new_email: &str,
        password: &str,
    ) -> Result<EmailChangeRequest> {
        let new_email = new_email.trim().to_lowercase();

        let current_hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;
        let verified = match current_hash {
            Some(hash) => verify_password(password, &hash)?,
            None => false,
        };
        if !verified {
            return Ok(EmailChangeRequest::InvalidPassword);
        }

        if self.email_registered(&new_email).await? {
            return Ok(EmailChangeRequest::EmailTaken);
        }

        let token = self.tokens.generate_email_change_token(user_id, &new_email)?;
        self.mailer.send(OutgoingMail {
            to: new_email,
            kind: MailKind::ConfirmEmailChange,
            token,
        });
        Ok(EmailChangeRequest::Sent)
    }

    /// Applies the address carried by `token`, refreshing the avatar hash.
    pub async fn change_email(&self, user_id: Uuid, token: &str, expiration: Duration) -> Result<bool> {
        let new_email = match self.tokens.email_change_target(user_id, token, expiration) {
            Some(email) => email,
            None => return Ok(false),
        };

        let mut tx = self.db.pool().begin().await?;

        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(&new_email)
            .fetch_one(&mut *tx)
            .await?;
        if taken {
            tx.rollback().await?;
            return Ok(false);
        }

        let result = sqlx::query("UPDATE users SET email = $2, avatar_hash = $3 WHERE id = $1")
            .bind(user_id)
            .bind(&new_email)
            .bind(avatar_hash(&new_email))
            .execute(&mut *tx)
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                let err = anyhow::Error::from(err);
                if unique_violation(&err).is_some() {
                    tx.rollback().await?;
                    return Ok(false);
                }
                return Err(err);
            }
        };

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        tracing::info!(user_id = %user_id, "email changed");
        Ok(true)
    }

    async fn email_registered(&self, email: &str) -> Result<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(self.db.pool())
            .await?;
        Ok(taken)
    }

    async fn store_password(&self, user_id: Uuid, new_password: &str) -> Result<bool> {
        let password_hash = hash_password(new_password)?;
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Argon2id hash with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
