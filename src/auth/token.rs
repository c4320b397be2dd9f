//! Token issuance and verification.
//!
//! Three kinds share one claim layout and differ by secret, lifetime and
//! the `type` claim. Verification never errors: every failure is `None`.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::units::parse_duration;
use crate::config::JwtConfig;
use crate::error::{ApiError, ConfigurationError};

/// Claim names that extra claims may not override.
pub const RESERVED_CLAIMS: [&str; 4] = ["sub", "type", "iat", "exp"];

/// Longest lifetime a token kind may be configured with (ten years).
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Service,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Service => "service",
        }
    }

    /// Input field reported when the identity is missing.
    fn subject_field(&self) -> &'static str {
        match self {
            TokenKind::Service => "serviceName",
            TokenKind::Access | TokenKind::Refresh => "userId",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id or service name.
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: u64,
    pub exp: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{0} token secret is not configured")]
    MissingSecret(TokenKind),

    #[error("{0} token requires a subject")]
    MissingSubject(TokenKind),

    #[error("claim `{0}` is reserved")]
    ReservedClaim(String),

    #[error("{0} token lifetime overflows the expiry timestamp")]
    LifetimeOverflow(TokenKind),

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let message = err.to_string();
        match err {
            TokenError::MissingSecret(kind) => ConfigurationError::MissingSecret(kind).into(),
            TokenError::MissingSubject(kind) => {
                ApiError::validation(message).with_field(kind.subject_field())
            }
            TokenError::ReservedClaim(name) => ApiError::validation(message).with_field(name),
            TokenError::LifetimeOverflow(_) | TokenError::Signing(_) => {
                ApiError::internal(message)
            }
        }
    }
}

#[derive(Clone)]
struct Secret {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Secret {
    fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Per-kind keys and lifetimes.
#[derive(Clone)]
pub struct TokenCodec {
    access: Option<Secret>,
    refresh: Option<Secret>,
    service: Option<Secret>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access", &self.access.is_some())
            .field("refresh", &self.refresh.is_some())
            .field("service", &self.service.is_some())
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenCodec {
    /// A codec with no secrets. Add them with [`TokenCodec::with_secret`].
    pub fn new(access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access: None,
            refresh: None,
            service: None,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Set the secret for `kind`. Empty secrets leave the kind unconfigured.
    pub fn with_secret(mut self, kind: TokenKind, secret: &str) -> Self {
        let secret = (!secret.is_empty()).then(|| Secret::new(secret));
        match kind {
            TokenKind::Access => self.access = secret,
            TokenKind::Refresh => self.refresh = secret,
            TokenKind::Service => self.service = secret,
        }
        self
    }

    pub fn from_config(config: &JwtConfig) -> Result<Self, ConfigurationError> {
        let mut codec = Self::new(
            parse_duration(&config.expiration)?,
            parse_duration(&config.refresh_expiration)?,
        );
        for (kind, secret) in [
            (TokenKind::Access, &config.secret),
            (TokenKind::Refresh, &config.refresh_secret),
            (TokenKind::Service, &config.service_secret),
        ] {
            if let Some(secret) = secret {
                codec = codec.with_secret(kind, secret);
            }
        }
        Ok(codec)
    }

    fn secret(&self, kind: TokenKind) -> Option<&Secret> {
        match kind {
            TokenKind::Access => self.access.as_ref(),
            TokenKind::Refresh => self.refresh.as_ref(),
            TokenKind::Service => self.service.as_ref(),
        }
    }

    pub fn has_secret(&self, kind: TokenKind) -> bool {
        self.secret(kind).is_some()
    }

    /// How long a freshly issued token of `kind` stays valid.
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::Access | TokenKind::Service => self.access_ttl,
        }
    }

    /// Sign a token for `subject` and return it with its claims.
    pub fn mint(
        &self,
        kind: TokenKind,
        subject: &str,
        extra: Map<String, Value>,
    ) -> Result<(String, Claims), TokenError> {
        let secret = self.secret(kind).ok_or(TokenError::MissingSecret(kind))?;
        if subject.trim().is_empty() {
            return Err(TokenError::MissingSubject(kind));
        }
        if let Some(name) = extra.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(TokenError::ReservedClaim(name.clone()));
        }

        let iat = now_secs();
        let exp = iat
            .checked_add(self.lifetime(kind).as_secs())
            .ok_or(TokenError::LifetimeOverflow(kind))?;
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            iat,
            exp,
            extra,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &secret.encoding)?;
        Ok((token, claims))
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        subject: &str,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        self.mint(kind, subject, extra).map(|(token, _)| token)
    }

    pub fn issue_access(&self, user_id: &str, extra: Map<String, Value>) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, user_id, extra)
    }

    pub fn issue_refresh(&self, user_id: &str, extra: Map<String, Value>) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, user_id, extra)
    }

    pub fn issue_service(
        &self,
        service_name: &str,
        extra: Map<String, Value>,
    ) -> Result<String, TokenError> {
        self.issue(TokenKind::Service, service_name, extra)
    }

    /// Verify `token` with the secret of `kind` and require a matching `type`.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Option<Claims> {
        let secret = self.secret(kind)?;
        let claims = decode_with(token, &secret.decoding)?;
        if claims.kind != kind {
            tracing::trace!(expected = %kind, found = %claims.kind, "Token type mismatch");
            return None;
        }
        Some(claims)
    }
}

/// Verify a token against a raw secret.
///
/// `None` on empty input, bad signature, expiry or malformed token.
pub fn verify(token: &str, secret: &str) -> Option<Claims> {
    if secret.is_empty() {
        return None;
    }
    decode_with(token, &DecodingKey::from_secret(secret.as_bytes()))
}

fn decode_with(token: &str, key: &DecodingKey) -> Option<Claims> {
    if token.is_empty() {
        return None;
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    match decode::<Claims>(token, key, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidToken
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_)
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => {
                    tracing::trace!(error = %e, "Token rejected");
                }
                _ => {
                    tracing::warn!(error = %e, "Unexpected token verification failure");
                }
            }
            None
        }
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
