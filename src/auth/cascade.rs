//! The auth cascade and its strict variants.
//!
//! # Decision order (combined `auth`)
//! 1. No bearer token → 401
//! 2. Valid service token → service principal
//! 3. Valid access token → user principal
//! 4. Otherwise renew from the `refreshToken` cookie, or 401
//!
//! The strict variants (`authUserOnly`, `authServiceOnly`) run a single
//! check with no renewal fallback.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use futures_util::future::{self, BoxFuture};

use crate::auth::revocation::{NeverRevoked, RevocationCheck};
use crate::auth::token::{TokenCodec, TokenKind};
use crate::auth::AuthContext;
use crate::error::{ApiError, ConfigurationError};
use crate::http::context::RequestContext;
use crate::http::middleware::{Flow, Middleware, MiddlewareResult};
use crate::observability::metrics;
use crate::routing::Registry;

/// Response header carrying a renewed access token.
pub const NEW_ACCESS_TOKEN_HEADER: &str = "x-new-access-token";

/// Cookie holding the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

const MISSING_HEADER: &str = "Missing or invalid Authorization header";
const NO_REFRESH: &str = "Access token expired and no refresh token provided";
const INVALID_REFRESH: &str = "Invalid refresh token. Please log in again";
const RENEWAL_FAILED: &str = "Failed to renew access token";
const INVALID_ACCESS: &str = "Invalid or expired access token";
const INVALID_SERVICE: &str = "Invalid service token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Service, then access, then renewal.
    Cascade,
    UserOnly,
    /// Service tokens only, 403 for anything else. Without a configured
    /// service secret every request fails with 500, even one that carries
    /// no `Authorization` header at all.
    ServiceOnly,
}

impl AuthMode {
    /// Middleware name used in route declarations.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::Cascade => "auth",
            AuthMode::UserOnly => "authUserOnly",
            AuthMode::ServiceOnly => "authServiceOnly",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Authenticated {
    pub context: AuthContext,
    /// Set when the access token was renewed from the refresh cookie.
    pub renewed_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub error: ApiError,
    /// The refresh cookie was presented but is unusable.
    pub clear_refresh_cookie: bool,
}

impl Rejection {
    fn new(error: ApiError) -> Self {
        Self {
            error,
            clear_refresh_cookie: false,
        }
    }
}

/// Builds the auth middlewares over one token codec.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    revocation: Arc<dyn RevocationCheck>,
}

impl Authenticator {
    pub fn new(codec: TokenCodec) -> Self {
        Self {
            codec: Arc::new(codec),
            revocation: Arc::new(NeverRevoked),
        }
    }

    /// Consult `revocation` before renewing from a refresh token.
    pub fn with_revocation(mut self, revocation: impl RevocationCheck) -> Self {
        self.revocation = Arc::new(revocation);
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Run the decision procedure for `mode`.
    pub fn authenticate(
        &self,
        mode: AuthMode,
        bearer: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<Authenticated, Rejection> {
        if mode == AuthMode::ServiceOnly && !self.codec.has_secret(TokenKind::Service) {
            return Err(Rejection::new(
                ConfigurationError::MissingSecret(TokenKind::Service).into(),
            ));
        }

        let token = match bearer.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => return Err(Rejection::new(ApiError::unauthorized(MISSING_HEADER))),
        };

        match mode {
            AuthMode::Cascade => self
                .as_service(token)
                .or_else(|| self.as_user(token))
                .map(Ok)
                .unwrap_or_else(|| self.renew(refresh)),
            AuthMode::UserOnly => self
                .as_user(token)
                .ok_or_else(|| Rejection::new(ApiError::unauthorized(INVALID_ACCESS))),
            AuthMode::ServiceOnly => self
                .as_service(token)
                .ok_or_else(|| Rejection::new(ApiError::forbidden(INVALID_SERVICE))),
        }
    }

    fn as_service(&self, token: &str) -> Option<Authenticated> {
        let claims = self.codec.verify_kind(token, TokenKind::Service)?;
        Some(Authenticated {
            context: AuthContext::Service {
                service: claims.sub.clone(),
                claims,
            },
            renewed_token: None,
        })
    }

    fn as_user(&self, token: &str) -> Option<Authenticated> {
        let claims = self
            .codec
            .verify_kind(token, TokenKind::Access)
            .filter(|c| !c.sub.is_empty())?;
        Some(Authenticated {
            context: AuthContext::User {
                user_id: claims.sub.clone(),
                claims,
                was_renewed: false,
            },
            renewed_token: None,
        })
    }

    fn renew(&self, refresh: Option<&str>) -> Result<Authenticated, Rejection> {
        let refresh = match refresh.filter(|t| !t.is_empty()) {
            Some(refresh) => refresh,
            None => return Err(Rejection::new(ApiError::unauthorized(NO_REFRESH))),
        };

        let claims = self
            .codec
            .verify_kind(refresh, TokenKind::Refresh)
            .filter(|c| !c.sub.is_empty())
            .filter(|_| !self.revocation.is_revoked(refresh))
            .ok_or(Rejection {
                error: ApiError::unauthorized(INVALID_REFRESH),
                clear_refresh_cookie: true,
            })?;

        let (token, access_claims) = self
            .codec
            .mint(TokenKind::Access, &claims.sub, claims.extra)
            .map_err(|e| {
                tracing::error!(user_id = %claims.sub, error = %e, "Access token renewal failed");
                Rejection::new(ApiError::internal(RENEWAL_FAILED))
            })?;

        tracing::debug!(user_id = %claims.sub, "Access token renewed from refresh cookie");
        metrics::record_renewal();

        Ok(Authenticated {
            context: AuthContext::User {
                user_id: claims.sub,
                claims: access_claims,
                was_renewed: true,
            },
            renewed_token: Some(token),
        })
    }

    /// A middleware running `mode`.
    pub fn middleware(&self, mode: AuthMode) -> Arc<dyn Middleware> {
        Arc::new(AuthMiddleware {
            mode,
            authenticator: self.clone(),
        })
    }

    pub fn auth(&self) -> Arc<dyn Middleware> {
        self.middleware(AuthMode::Cascade)
    }

    pub fn user_only(&self) -> Arc<dyn Middleware> {
        self.middleware(AuthMode::UserOnly)
    }

    pub fn service_only(&self) -> Arc<dyn Middleware> {
        self.middleware(AuthMode::ServiceOnly)
    }

    /// Register `auth`, `authUserOnly` and `authServiceOnly`.
    pub fn register(&self, registry: Registry) -> Registry {
        registry
            .middleware(self.auth())
            .middleware(self.user_only())
            .middleware(self.service_only())
    }
}

struct AuthMiddleware {
    mode: AuthMode,
    authenticator: Authenticator,
}

impl AuthMiddleware {
    fn run(&self, ctx: &mut RequestContext) -> MiddlewareResult {
        let bearer = bearer_token(ctx.headers());
        let refresh = ctx.cookie(REFRESH_COOKIE);

        match self
            .authenticator
            .authenticate(self.mode, bearer.as_deref(), refresh.as_deref())
        {
            Ok(authenticated) => {
                let outcome = match (&authenticated.context, &authenticated.renewed_token) {
                    (AuthContext::Service { .. }, _) => "service",
                    (AuthContext::User { .. }, Some(_)) => "renewed",
                    (AuthContext::User { .. }, None) => "user",
                };
                metrics::record_auth(self.mode.name(), outcome);

                if let Some(token) = authenticated.renewed_token {
                    let value = HeaderValue::from_str(&token)
                        .map_err(|_| ApiError::internal(RENEWAL_FAILED))?;
                    ctx.set_response_header(HeaderName::from_static(NEW_ACCESS_TOKEN_HEADER), value);
                }
                ctx.set_auth(authenticated.context);
                Ok(Flow::Continue)
            }
            Err(rejection) => {
                metrics::record_auth(self.mode.name(), "rejected");
                tracing::debug!(
                    variant = self.mode.name(),
                    path = ctx.path(),
                    status = rejection.error.status().as_u16(),
                    reason = rejection.error.message(),
                    "Authentication failed"
                );
                if rejection.clear_refresh_cookie {
                    ctx.remove_cookie(REFRESH_COOKIE);
                }
                Err(rejection.error)
            }
        }
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &str {
        self.mode.name()
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(future::ready(self.run(ctx)))
    }
}

/// The `refreshToken` cookie: HttpOnly, SameSite=Strict, path `/`.
pub fn refresh_cookie(token: impl Into<String>) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token.into()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .build()
}

/// The bearer token of `headers`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::RevocationList;
    use crate::auth::token::{now_secs, Claims};
    use crate::http::context::test_context;
    use axum::http::{header, Request, StatusCode};
    use axum::response::IntoResponse;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Map, Value};
    use std::time::Duration;

    fn codec() -> TokenCodec {
        TokenCodec::new(Duration::from_secs(900), Duration::from_secs(86_400))
            .with_secret(TokenKind::Access, "access-secret")
            .with_secret(TokenKind::Refresh, "refresh-secret")
            .with_secret(TokenKind::Service, "service-secret")
    }

    fn expired_access() -> String {
        let now = now_secs();
        let claims = Claims {
            sub: "u1".into(),
            kind: TokenKind::Access,
            iat: now - 3600,
            exp: now - 60,
            extra: Map::new(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"access-secret")).unwrap()
    }

    fn rejection(result: Result<Authenticated, Rejection>) -> Rejection {
        match result {
            Err(rejection) => rejection,
            Ok(ok) => panic!("expected rejection, got {ok:?}"),
        }
    }

    #[test]
    fn test_missing_bearer_is_401_in_every_mode() {
        let auth = Authenticator::new(codec());
        for mode in [AuthMode::Cascade, AuthMode::UserOnly, AuthMode::ServiceOnly] {
            let r = rejection(auth.authenticate(mode, None, Some("cookie")));
            assert_eq!(r.error.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(r.error.message(), MISSING_HEADER);
            assert!(!r.clear_refresh_cookie);
        }
    }

    #[test]
    fn test_service_token_wins() {
        let auth = Authenticator::new(codec());
        let token = auth.codec().issue_service("billing", Map::new()).unwrap();
        let ok = auth.authenticate(AuthMode::Cascade, Some(&token), None).unwrap();
        assert_eq!(ok.context.service(), Some("billing"));
        assert!(ok.renewed_token.is_none());
    }

    #[test]
    fn test_shared_secret_resolves_by_token_type() {
        let shared = TokenCodec::new(Duration::from_secs(900), Duration::from_secs(86_400))
            .with_secret(TokenKind::Access, "shared-secret")
            .with_secret(TokenKind::Refresh, "refresh-secret")
            .with_secret(TokenKind::Service, "shared-secret");
        let auth = Authenticator::new(shared);

        let service = auth.codec().issue_service("billing", Map::new()).unwrap();
        let ok = auth.authenticate(AuthMode::Cascade, Some(&service), None).unwrap();
        assert!(ok.context.is_service());
        assert_eq!(ok.context.service(), Some("billing"));

        let access = auth.codec().issue_access("u1", Map::new()).unwrap();
        let ok = auth.authenticate(AuthMode::Cascade, Some(&access), None).unwrap();
        assert!(!ok.context.is_service());
        assert_eq!(ok.context.user_id(), Some("u1"));
        assert!(ok.renewed_token.is_none());
    }

    #[test]
    fn test_valid_access_token_is_user() {
        let auth = Authenticator::new(codec());
        let token = auth
            .codec()
            .issue_access("u1", Map::from_iter([("role".to_string(), Value::from("admin"))]))
            .unwrap();
        let ok = auth.authenticate(AuthMode::Cascade, Some(&token), None).unwrap();
        assert_eq!(ok.context.user_id(), Some("u1"));
        assert!(!ok.context.was_renewed());
        assert_eq!(ok.context.claims().extra["role"], "admin");
    }

    #[test]
    fn test_expired_access_without_cookie() {
        let auth = Authenticator::new(codec());
        let r = rejection(auth.authenticate(AuthMode::Cascade, Some(&expired_access()), None));
        assert_eq!(r.error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(r.error.message(), NO_REFRESH);
    }

    #[test]
    fn test_renewal_from_refresh_cookie() {
        let auth = Authenticator::new(codec());
        let refresh = auth
            .codec()
            .issue_refresh("u1", Map::from_iter([("tenant".to_string(), json!("acme"))]))
            .unwrap();
        let ok = auth
            .authenticate(AuthMode::Cascade, Some(&expired_access()), Some(&refresh))
            .unwrap();

        assert!(ok.context.was_renewed());
        assert_eq!(ok.context.user_id(), Some("u1"));
        let renewed = ok.renewed_token.unwrap();
        let claims = auth.codec().verify_kind(&renewed, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.extra["tenant"], "acme");
    }

    #[test]
    fn test_bearer_is_never_tried_as_refresh() {
        let auth = Authenticator::new(codec());
        let refresh = auth.codec().issue_refresh("u1", Map::new()).unwrap();
        let r = rejection(auth.authenticate(AuthMode::Cascade, Some(&refresh), None));
        assert_eq!(r.error.message(), NO_REFRESH);
    }

    #[test]
    fn test_invalid_or_revoked_refresh_clears_cookie() {
        let revoked = RevocationList::new();
        let auth = Authenticator::new(codec()).with_revocation(revoked.clone());

        let r = rejection(auth.authenticate(AuthMode::Cascade, Some("garbage"), Some("garbage")));
        assert_eq!(r.error.message(), INVALID_REFRESH);
        assert!(r.clear_refresh_cookie);

        let refresh = auth.codec().issue_refresh("u1", Map::new()).unwrap();
        revoked.revoke(refresh.clone(), now_secs() + 3600);
        let r = rejection(auth.authenticate(AuthMode::Cascade, Some("garbage"), Some(&refresh)));
        assert_eq!(r.error.status(), StatusCode::UNAUTHORIZED);
        assert!(r.clear_refresh_cookie);
    }

    #[test]
    fn test_renewal_without_access_secret_is_500() {
        let codec = TokenCodec::new(Duration::from_secs(60), Duration::from_secs(60))
            .with_secret(TokenKind::Refresh, "refresh-secret");
        let auth = Authenticator::new(codec);
        let refresh = auth.codec().issue_refresh("u1", Map::new()).unwrap();
        let r = rejection(auth.authenticate(AuthMode::Cascade, Some("x"), Some(&refresh)));
        assert_eq!(r.error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(r.error.message(), RENEWAL_FAILED);
    }

    #[test]
    fn test_user_only_rejects_service_and_never_renews() {
        let auth = Authenticator::new(codec());
        let service = auth.codec().issue_service("billing", Map::new()).unwrap();
        let refresh = auth.codec().issue_refresh("u1", Map::new()).unwrap();

        let r = rejection(auth.authenticate(AuthMode::UserOnly, Some(&service), Some(&refresh)));
        assert_eq!(r.error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(r.error.message(), INVALID_ACCESS);

        let access = auth.codec().issue_access("u1", Map::new()).unwrap();
        assert!(auth.authenticate(AuthMode::UserOnly, Some(&access), None).is_ok());
    }

    #[test]
    fn test_service_only() {
        let auth = Authenticator::new(codec());
        let access = auth.codec().issue_access("u1", Map::new()).unwrap();
        let r = rejection(auth.authenticate(AuthMode::ServiceOnly, Some(&access), None));
        assert_eq!(r.error.status(), StatusCode::FORBIDDEN);
        assert_eq!(r.error.message(), INVALID_SERVICE);

        let unconfigured = Authenticator::new(
            TokenCodec::new(Duration::from_secs(60), Duration::from_secs(60))
                .with_secret(TokenKind::Access, "access-secret"),
        );
        let r = rejection(unconfigured.authenticate(AuthMode::ServiceOnly, Some(&access), None));
        assert_eq!(r.error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let r = rejection(unconfigured.authenticate(AuthMode::ServiceOnly, None, None));
        assert_eq!(r.error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[tokio::test]
    async fn test_middleware_sets_header_and_context_on_renewal() {
        let auth = Authenticator::new(codec());
        let refresh = auth.codec().issue_refresh("u1", Map::new()).unwrap();
        let mut ctx = test_context(
            Request::builder()
                .header(header::AUTHORIZATION, format!("Bearer {}", expired_access()))
                .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh}"))
                .body(())
                .unwrap(),
        );

        let middleware = auth.auth();
        assert_eq!(middleware.name(), "auth");
        assert!(matches!(middleware.handle(&mut ctx).await, Ok(Flow::Continue)));
        assert!(ctx.auth().unwrap().was_renewed());

        let response = ctx
            .response_handle()
            .decorate(StatusCode::OK.into_response());
        assert!(response.headers().contains_key(NEW_ACCESS_TOKEN_HEADER));
    }

    #[tokio::test]
    async fn test_middleware_clears_cookie_on_bad_refresh() {
        let auth = Authenticator::new(codec());
        let mut ctx = test_context(
            Request::builder()
                .header(header::AUTHORIZATION, "Bearer nope")
                .header(header::COOKIE, format!("{REFRESH_COOKIE}=nope"))
                .body(())
                .unwrap(),
        );

        let err = match auth.auth().handle(&mut ctx).await {
            Err(err) => err,
            Ok(_) => panic!("expected rejection"),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.auth().is_none());

        let response = ctx
            .response_handle()
            .decorate(StatusCode::UNAUTHORIZED.into_response());
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("refreshToken="));
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("abc").to_string();
        assert!(cookie.starts_with("refreshToken=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
    }

    #[test]
    fn test_register_uses_declared_names() {
        let registry = Authenticator::new(codec()).register(Registry::new());
        for name in ["auth", "authUserOnly", "authServiceOnly"] {
            assert!(registry.has_middleware(name));
        }
    }
}
