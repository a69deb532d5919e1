pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use time::Duration;

use crate::app::auth::AuthService;
use crate::app::tokens::AccountTokens;
use crate::config::AppConfig;
use crate::infra::{db::Db, mail::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub tokens: AccountTokens,
    pub mailer: Arc<dyn Mailer>,
    pub admin_email: Option<String>,
    pub token_expiration_seconds: i64,
    pub posts_per_page: i64,
    pub comments_per_page: i64,
    pub followers_per_page: i64,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            tokens: AccountTokens::new(config.secret_key, config.access_ttl_minutes),
            mailer,
            admin_email: config.admin_email.clone(),
            token_expiration_seconds: config.token_expiration_seconds,
            posts_per_page: config.posts_per_page,
            comments_per_page: config.comments_per_page,
            followers_per_page: config.followers_per_page,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.tokens.clone(),
            self.mailer.clone(),
            self.admin_email.clone(),
        )
    }

    /// Maximum age accepted for confirmation, reset and email-change tokens.
    pub fn token_expiration(&self) -> Duration {
        Duration::seconds(self.token_expiration_seconds)
    }
}
