//! Bearer-token identity for the API.
//!
//! Credential issuance is an external collaborator's job; this layer only
//! resolves a caller credential into an actor identity. A JWT carries the
//! actor id and role; `require_auth` verifies it and attaches an `AuthUser`
//! extension. In dev mode identity comes from the `x-actor-id` /
//! `x-actor-role` headers instead, which keeps multi-actor flows easy to
//! exercise locally.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use crate::error::Error;
use crate::types::ActorRole;

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};

const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Actor id.
    sub: String,
    /// Actor role: "human" or "agent".
    #[serde(default)]
    role: String,
    iat: i64,
    exp: i64,
}

/// The resolved caller identity.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: ActorRole,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(TOKEN_TTL_DAYS);
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Dev-only token issuance. Real deployments put an identity provider in
/// front and this endpoint refuses to mint.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    if !state.config.dev_mode {
        return Err((
            StatusCode::FORBIDDEN,
            "token issuance is handled by the identity provider".to_string(),
        ));
    }
    let secret = state.config.jwt_secret.as_deref().ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "JWT_SECRET not configured".to_string(),
    ))?;

    let actor_id = req.actor_id.trim();
    if actor_id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "actor_id required".to_string()));
    }
    let role = match req.role.as_deref() {
        Some(r) => ActorRole::parse(r)
            .ok_or((StatusCode::BAD_REQUEST, "invalid role".to_string()))?,
        None => ActorRole::Human,
    };

    let user = AuthUser {
        id: actor_id.to_string(),
        role,
    };
    let (token, exp) =
        issue_jwt(secret, &user).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode: identity from headers, no token checks.
    if state.config.dev_mode {
        let id = header_str(req.headers(), "x-actor-id")
            .unwrap_or("dev")
            .to_string();
        let role = header_str(req.headers(), "x-actor-role")
            .and_then(ActorRole::parse)
            .unwrap_or(ActorRole::Human);
        req.extensions_mut().insert(AuthUser { id, role });
        return next.run(req).await;
    }

    // Without a secret configured, fail closed.
    let secret = match state.config.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = header_str(req.headers(), "authorization").unwrap_or("");
    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");
    if token.is_empty() {
        return Error::AuthenticationRequired.into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => {
            let role = ActorRole::parse(&claims.role).unwrap_or(ActorRole::Human);
            req.extensions_mut().insert(AuthUser {
                id: claims.sub,
                role,
            });
            next.run(req).await
        }
        Err(_) => Error::AuthenticationRequired.into_response(),
    }
}

/// Guard for the internal callback surface (extended moderation, automated
/// application review): a shared secret in `x-moderation-secret`.
pub fn verify_moderation_secret(state: &AppState, headers: &HeaderMap) -> Result<(), Error> {
    let expected = state
        .config
        .moderation_secret
        .as_deref()
        .ok_or(Error::AuthenticationRequired)?;
    let presented = header_str(headers, "x-moderation-secret").unwrap_or("");
    if presented.is_empty() || !constant_time_eq(presented, expected) {
        return Err(Error::AuthenticationRequired);
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
