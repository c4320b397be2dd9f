//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>        refreshToken cookie
//!     → cascade.rs (service → access → renewal)
//!     → token.rs (HS256 verify, type check)
//!     → AuthContext on the RequestContext
//! ```
//!
//! # Design Decisions
//! - One secret per token kind; the `type` claim must match the kind
//! - Verification failures are values (`None`), never errors
//! - Renewal only ever reads the refresh cookie, never the bearer token

pub mod cascade;
pub mod revocation;
pub mod token;

pub use cascade::{
    bearer_token, refresh_cookie, AuthMode, Authenticated, Authenticator, Rejection,
    NEW_ACCESS_TOKEN_HEADER, REFRESH_COOKIE,
};
pub use revocation::{NeverRevoked, RevocationCheck, RevocationList};
pub use token::{verify, Claims, TokenCodec, TokenError, TokenKind, RESERVED_CLAIMS};

/// The authenticated principal of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    Service {
        service: String,
        claims: Claims,
    },
    User {
        user_id: String,
        claims: Claims,
        /// The bearer token was rejected and a new one issued from the
        /// refresh cookie.
        was_renewed: bool,
    },
}

impl AuthContext {
    /// User id or service name.
    pub fn principal(&self) -> &str {
        match self {
            AuthContext::Service { service, .. } => service,
            AuthContext::User { user_id, .. } => user_id,
        }
    }

    pub fn claims(&self) -> &Claims {
        match self {
            AuthContext::Service { claims, .. } | AuthContext::User { claims, .. } => claims,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, AuthContext::Service { .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthContext::User { user_id, .. } => Some(user_id),
            AuthContext::Service { .. } => None,
        }
    }

    pub fn service(&self) -> Option<&str> {
        match self {
            AuthContext::Service { service, .. } => Some(service),
            AuthContext::User { .. } => None,
        }
    }

    pub fn was_renewed(&self) -> bool {
        matches!(self, AuthContext::User { was_renewed: true, .. })
    }
}
