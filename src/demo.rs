//! Demo application served by the `nestroute` binary.
//!
//! Two in-memory users (`alice` / `wonderland`, `bob` / `builder`, bob is an
//! admin) and an in-memory post list. The same handlers are available by
//! name for route trees declared in the config file.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::http::{header, StatusCode};
use axum::Json;
use nestroute::auth::{
    refresh_cookie, AuthContext, Authenticator, RevocationCheck, RevocationList, TokenKind,
    REFRESH_COOKIE,
};
use nestroute::http::{reply, Handler, HandlerResult, RequestContext};
use nestroute::{ApiError, Registry, RouteGroup, RouteLeaf};
use serde::Deserialize;
use serde_json::{json, Map, Value};

struct User {
    password: &'static str,
    role: &'static str,
}

pub struct DemoState {
    auth: Authenticator,
    revoked: RevocationList,
    users: HashMap<&'static str, User>,
    posts: Mutex<Vec<Value>>,
}

impl DemoState {
    pub fn new(auth: Authenticator, revoked: RevocationList) -> Arc<Self> {
        let users = HashMap::from([
            ("alice", User { password: "wonderland", role: "user" }),
            ("bob", User { password: "builder", role: "admin" }),
        ]);
        Arc::new(Self {
            auth,
            revoked,
            users,
            posts: Mutex::new(Vec::new()),
        })
    }

    fn posts(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        self.posts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn with_state<F, Fut>(state: &Arc<DemoState>, f: F) -> impl Handler
where
    F: Fn(Arc<DemoState>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let state = state.clone();
    move |ctx: RequestContext| f(state.clone(), ctx)
}

/// The built-in route tree.
pub fn routes(state: &Arc<DemoState>) -> RouteGroup {
    let auth = &state.auth;
    RouteGroup::new()
        .route("health", RouteLeaf::get(health))
        .route(
            "auth",
            RouteGroup::new()
                .route("login", RouteLeaf::post(with_state(state, login)))
                .route("refresh", RouteLeaf::post(with_state(state, refresh)))
                .route("logout", RouteLeaf::post(with_state(state, logout)))
                .route(
                    "service-token",
                    RouteLeaf::post(with_state(state, service_token)).middleware(auth.user_only()),
                ),
        )
        .route(
            "api/v1",
            RouteGroup::new()
                .route("me", RouteLeaf::get(me).middleware(auth.auth()))
                .route(
                    "posts",
                    RouteGroup::new()
                        .route("", RouteLeaf::get(with_state(state, list_posts)).middleware(auth.auth()))
                        .route(
                            "",
                            RouteLeaf::post(with_state(state, create_post)).middleware(auth.user_only()),
                        )
                        .route(":id", RouteLeaf::get(with_state(state, show_post)).middleware(auth.auth())),
                )
                .route("export", RouteLeaf::get(with_state(state, export)).middleware(auth.auth())),
        )
        .route(
            "internal/ping",
            RouteLeaf::get(ping).middleware(auth.service_only()),
        )
}

/// Every demo handler and the auth middlewares, by name.
pub fn registry(state: &Arc<DemoState>) -> Registry {
    let registry = Registry::new()
        .handler("health", health)
        .handler("login", with_state(state, login))
        .handler("refresh", with_state(state, refresh))
        .handler("logout", with_state(state, logout))
        .handler("service_token", with_state(state, service_token))
        .handler("me", me)
        .handler("list_posts", with_state(state, list_posts))
        .handler("create_post", with_state(state, create_post))
        .handler("show_post", with_state(state, show_post))
        .handler("export", with_state(state, export))
        .handler("ping", ping);
    state.auth.register(registry)
}

async fn health(_ctx: RequestContext) -> HandlerResult {
    reply(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let body: LoginRequest = ctx.json()?;
    if body.username.is_empty() {
        return Err(ApiError::validation("username is required").with_field("username"));
    }

    let user = state
        .users
        .get(body.username.as_str())
        .filter(|u| u.password == body.password)
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let mut extra = Map::new();
    extra.insert("role".into(), Value::from(user.role));

    let codec = state.auth.codec();
    let access = codec.issue_access(&body.username, extra.clone())?;
    let refresh = codec.issue_refresh(&body.username, extra)?;
    ctx.set_cookie(refresh_cookie(refresh));

    tracing::info!(user_id = %body.username, "User logged in");
    reply(json!({
        "accessToken": access,
        "expiresIn": codec.lifetime(TokenKind::Access).as_secs(),
    }))
}

async fn refresh(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let token = ctx
        .cookie(REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("No refresh token provided"))?;

    let codec = state.auth.codec();
    let claims = match codec.verify_kind(&token, TokenKind::Refresh) {
        Some(claims) if !state.revoked.is_revoked(&token) => claims,
        _ => {
            ctx.remove_cookie(REFRESH_COOKIE);
            return Err(ApiError::unauthorized("Invalid refresh token. Please log in again"));
        }
    };

    let access = codec.issue_access(&claims.sub, claims.extra)?;
    reply(json!({ "accessToken": access }))
}

async fn logout(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    if let Some(token) = ctx.cookie(REFRESH_COOKIE) {
        if let Some(claims) = state.auth.codec().verify_kind(&token, TokenKind::Refresh) {
            state.revoked.revoke(token, claims.exp);
            tracing::info!(user_id = %claims.sub, "Refresh token revoked");
        }
    }
    ctx.remove_cookie(REFRESH_COOKIE);
    Ok(None)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceTokenRequest {
    #[serde(default)]
    service_name: String,
}

async fn service_token(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let is_admin = ctx
        .auth()
        .map(|auth| auth.claims().extra.get("role") == Some(&Value::from("admin")))
        .unwrap_or(false);
    if !is_admin {
        return Err(ApiError::forbidden("Only admins may issue service tokens"));
    }

    let body: ServiceTokenRequest = ctx.json()?;
    let token = state.auth.codec().issue_service(&body.service_name, Map::new())?;
    reply(json!({ "serviceToken": token }))
}

async fn me(ctx: RequestContext) -> HandlerResult {
    match ctx.auth() {
        Some(AuthContext::User { user_id, claims, was_renewed }) => reply(json!({
            "kind": "user",
            "id": user_id,
            "role": claims.extra.get("role"),
            "renewed": was_renewed,
        })),
        Some(AuthContext::Service { service, .. }) => reply(json!({
            "kind": "service",
            "id": service,
        })),
        None => Err(ApiError::unauthorized("Not authenticated")),
    }
}

async fn list_posts(state: Arc<DemoState>, _ctx: RequestContext) -> HandlerResult {
    let posts = state.posts().clone();
    reply(posts)
}

#[derive(Deserialize)]
struct NewPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

async fn create_post(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let input: NewPost = ctx.json()?;
    if input.title.trim().is_empty() {
        return Err(ApiError::validation("title is required").with_field("title"));
    }

    let author = ctx.auth().map(|a| a.principal().to_string());
    let post = {
        let mut posts = state.posts();
        let post = json!({
            "id": (posts.len() + 1).to_string(),
            "title": input.title,
            "body": input.body,
            "author": author,
        });
        posts.push(post.clone());
        post
    };

    ctx.send((StatusCode::CREATED, Json(post)));
    Ok(None)
}

async fn show_post(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let id = ctx.param("id").unwrap_or_default();
    let post = state
        .posts()
        .iter()
        .find(|p| p["id"] == id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("Post {id} not found")))?;
    reply(post)
}

async fn export(state: Arc<DemoState>, ctx: RequestContext) -> HandlerResult {
    let mut csv = String::from("id,title,author\n");
    for post in state.posts().iter() {
        csv.push_str(&format!(
            "{},{},{}\n",
            post["id"].as_str().unwrap_or_default(),
            post["title"].as_str().unwrap_or_default(),
            post["author"].as_str().unwrap_or_default(),
        ));
    }

    ctx.send(([(header::CONTENT_TYPE, "text/csv")], csv));
    Ok(None)
}

async fn ping(ctx: RequestContext) -> HandlerResult {
    reply(json!({
        "pong": true,
        "service": ctx.auth().and_then(|a| a.service()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use axum::body::Body;
    use axum::http::Request;
    use nestroute::{HttpServer, ServerConfig, TokenCodec};
    use tower::ServiceExt;

    fn state() -> Arc<DemoState> {
        let codec = TokenCodec::new(Duration::from_secs(900), Duration::from_secs(86_400))
            .with_secret(TokenKind::Access, "access-secret")
            .with_secret(TokenKind::Refresh, "refresh-secret")
            .with_secret(TokenKind::Service, "service-secret");
        let revoked = RevocationList::new();
        let auth = Authenticator::new(codec).with_revocation(revoked.clone());
        DemoState::new(auth, revoked)
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    async fn refresh_with(state: &Arc<DemoState>, token: &str) -> StatusCode {
        let router = HttpServer::new(ServerConfig::default(), &routes(state))
            .unwrap()
            .into_router();
        let request = Request::post("/auth/refresh")
            .header(header::COOKIE, format!("{REFRESH_COOKIE}={token}"))
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_refresh_honours_revocation_until_entry_expires() {
        let state = state();
        let token = state.auth.codec().issue_refresh("alice", Map::new()).unwrap();
        assert_eq!(refresh_with(&state, &token).await, StatusCode::OK);

        state.revoked.revoke(token.clone(), now() + 60);
        assert_eq!(refresh_with(&state, &token).await, StatusCode::UNAUTHORIZED);

        // A lapsed entry no longer blocks, matching the auth middleware.
        state.revoked.revoke(token.clone(), now() - 1);
        assert_eq!(refresh_with(&state, &token).await, StatusCode::OK);
    }
}
