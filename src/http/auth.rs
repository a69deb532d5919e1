use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::domain::permission::Permission;
use crate::http::AppError;
use crate::AppState;

/// Caller identified by a bearer access token. Extracting it refreshes the
/// account's `last_seen`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub confirmed: bool,
    pub role: String,
    pub permissions: Permission,
}

impl AuthUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.has(permission)
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::Admin)
    }

    /// Gate for operations that need `permission` on a confirmed account.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if !self.confirmed {
            return Err(AppError::forbidden("unconfirmed account"));
        }
        if !self.can(permission) {
            return Err(AppError::forbidden("insufficient permissions"));
        }
        Ok(())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let account = state
            .auth_service()
            .authenticate(token.trim())
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        Ok(AuthUser {
            user_id: account.user.id,
            email: account.user.email,
            confirmed: account.user.confirmed,
            role: account.role.name,
            permissions: account.role.permissions,
        })
    }
}
