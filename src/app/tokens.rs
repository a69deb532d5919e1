//! Signed, timestamped account tokens.
//!
//! Every token is a PASETO v4.local payload carrying one purpose claim whose
//! value is the subject user id (`{"confirm": id}`, `{"reset": id}`, ...).
//! Expiry is checked against the caller's maximum age at verification time,
//! not baked into the token. Any failure to decode, authenticate or match a
//! token is reported as `None`/`false`; no decode error leaves this module.

use anyhow::Result;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::MAX_ACCESS_TTL_MINUTES;

const ISSUER: &str = "quill";
const NEW_EMAIL_CLAIM: &str = "new_email";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenPurpose {
    Access,
    Confirm,
    Reset,
    ChangeEmail,
}

impl TokenPurpose {
    fn claim(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Confirm => "confirm",
            Self::Reset => "reset",
            Self::ChangeEmail => "change_email",
        }
    }
}

/// Purpose-specific token pairs sharing one process-wide secret.
#[derive(Clone)]
pub struct AccountTokens {
    signer: TokenSigner,
    access_ttl: Duration,
}

impl AccountTokens {
    pub fn new(secret_key: [u8; 32], access_ttl_minutes: i64) -> Self {
        Self {
            signer: TokenSigner { key: secret_key },
            access_ttl: Duration::minutes(access_ttl_minutes.clamp(0, MAX_ACCESS_TTL_MINUTES)),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        self.signer.sign(TokenPurpose::Access, user_id, &[])
    }

    /// User id behind a still-valid access token.
    pub fn authenticate(&self, token: &str) -> Option<Uuid> {
        self.signer
            .verify(token, TokenPurpose::Access, self.access_ttl)
            .map(|verified| verified.subject)
    }

    pub fn generate_confirmation_token(&self, user_id: Uuid) -> Result<String> {
        self.signer.sign(TokenPurpose::Confirm, user_id, &[])
    }

    /// True only when `token` confirms `user_id` and is younger than `max_age`.
    pub fn confirms(&self, user_id: Uuid, token: &str, max_age: Duration) -> bool {
        self.signer
            .verify(token, TokenPurpose::Confirm, max_age)
            .map(|verified| verified.subject == user_id)
            .unwrap_or(false)
    }

    pub fn generate_reset_token(&self, user_id: Uuid) -> Result<String> {
        self.signer.sign(TokenPurpose::Reset, user_id, &[])
    }

    /// Account a reset token was issued for.
    pub fn reset_subject(&self, token: &str, max_age: Duration) -> Option<Uuid> {
        self.signer
            .verify(token, TokenPurpose::Reset, max_age)
            .map(|verified| verified.subject)
    }

    pub fn generate_email_change_token(&self, user_id: Uuid, new_email: &str) -> Result<String> {
        self.signer
            .sign(TokenPurpose::ChangeEmail, user_id, &[(NEW_EMAIL_CLAIM, new_email)])
    }

    /// Requested address, when `token` was issued to `user_id` and carries one.
    pub fn email_change_target(
        &self,
        user_id: Uuid,
        token: &str,
        max_age: Duration,
    ) -> Option<String> {
        let verified = self
            .signer
            .verify(token, TokenPurpose::ChangeEmail, max_age)?;
        if verified.subject != user_id {
            return None;
        }
        verified
            .claims
            .get_claim(NEW_EMAIL_CLAIM)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }
}

#[derive(Clone)]
struct TokenSigner {
    key: [u8; 32],
}

struct VerifiedToken {
    subject: Uuid,
    claims: Claims,
}

impl TokenSigner {
    fn sign(&self, purpose: TokenPurpose, subject: Uuid, extra: &[(&str, &str)]) -> Result<String> {
        let issued_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let mut claims = Claims::new()?;
        claims.non_expiring();
        claims.issued_at(&issued_at)?;
        claims.not_before(&issued_at)?;
        claims.issuer(ISSUER)?;
        claims.audience(ISSUER)?;
        claims.add_additional(purpose.claim(), subject.to_string())?;
        for (name, value) in extra {
            claims.add_additional(name, *value)?;
        }

        let key = SymmetricKey::<V4>::from(&self.key)?;
        Ok(local::encrypt(&key, &claims, None, None)?)
    }

    fn verify(&self, token: &str, purpose: TokenPurpose, max_age: Duration) -> Option<VerifiedToken> {
        let key = SymmetricKey::<V4>::from(&self.key).ok()?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(ISSUER);
        rules.validate_audience_with(ISSUER);
        rules.allow_non_expiring();

        let untrusted = UntrustedToken::<Local, V4>::try_from(token).ok()?;
        let trusted = local::decrypt(&key, &untrusted, &rules, None, None).ok()?;
        let claims = trusted.payload_claims()?.clone();

        let issued_at = claims.get_claim("iat")?.as_str()?;
        let issued_at = OffsetDateTime::parse(issued_at, &Rfc3339).ok()?;
        if OffsetDateTime::now_utc() - issued_at > max_age {
            return None;
        }

        let subject = claims.get_claim(purpose.claim())?.as_str()?;
        let subject = Uuid::parse_str(subject).ok()?;
        Some(VerifiedToken { subject, claims })
    }
}
