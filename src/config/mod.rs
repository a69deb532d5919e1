use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Upper bound for access token lifetimes (one year).
pub const MAX_ACCESS_TTL_MINUTES: i64 = 525_600;

/// Upper bound for confirmation, reset and email-change token ages (30 days).
pub const MAX_TOKEN_EXPIRATION_SECONDS: i64 = 2_592_000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub secret_key: [u8; 32],
    pub access_ttl_minutes: i64,
    pub token_expiration_seconds: i64,
    pub admin_email: Option<String>,
    pub posts_per_page: i64,
    pub comments_per_page: i64,
    pub followers_per_page: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let config = Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            secret_key: env_key_32("SECRET_KEY")?,
            access_ttl_minutes: env_or_bounded(
                "ACCESS_TTL_MINUTES",
                "60",
                1..=MAX_ACCESS_TTL_MINUTES,
            )?,
            token_expiration_seconds: env_or_bounded(
                "TOKEN_EXPIRATION_SECONDS",
                "3600",
                1..=MAX_TOKEN_EXPIRATION_SECONDS,
            )?,
            admin_email: std::env::var("ADMIN_EMAIL")
                .ok()
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty()),
            posts_per_page: env_or_parse("POSTS_PER_PAGE", "20")?,
            comments_per_page: env_or_parse("COMMENTS_PER_PAGE", "30")?,
            followers_per_page: env_or_parse("FOLLOWERS_PER_PAGE", "50")?,
        };

        for (key, value) in [
            ("POSTS_PER_PAGE", config.posts_per_page),
            ("COMMENTS_PER_PAGE", config.comments_per_page),
            ("FOLLOWERS_PER_PAGE", config.followers_per_page),
        ] {
            if value < 1 {
                return Err(anyhow!("invalid {}: must be at least 1", key));
            }
        }

        Ok(config)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_or_bounded(key: &str, default: &str, range: RangeInclusive<i64>) -> Result<i64> {
    let value: i64 = env_or_parse(key, default)?;
    if !range.contains(&value) {
        return Err(anyhow!(
            "invalid {}: must be between {} and {}",
            key,
            range.start(),
            range.end()
        ));
    }
    Ok(value)
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
