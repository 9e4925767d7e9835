use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use uuid::Uuid;

use crate::auth::{validate_jwt, AuthError};
use crate::config;
use crate::database::models::{Role, User};
use crate::database::service::find_user_by_id;
use crate::error::ApiError;
use crate::observer::context::Actor;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";

/// Authenticated caller, loaded fresh from the users table on every request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role()
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.user.id,
            role: self.role(),
        }
    }

    /// 403 unless the caller holds one of `roles`
    pub fn authorize(&self, roles: &[Role]) -> Result<(), ApiError> {
        let role = self.role();
        if roles.contains(&role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "User role {} is not authorized to access this route",
                role
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let claims = validate_jwt(&token)?;

        let state = parts
            .extensions
            .get::<AppState>()
            .cloned()
            .ok_or_else(|| ApiError::internal_server_error("Application state missing"))?;

        let user = find_user_by_id(&state.pool, claims.sub).await?.ok_or_else(|| {
            tracing::debug!("Token subject {} no longer exists", claims.sub);
            ApiError::from(AuthError::InvalidToken("unknown subject".to_string()))
        })?;

        Ok(AuthUser { user })
    }
}

/// Bearer header first, then the `token` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty() && *value != "none")
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a freshly issued token
pub fn token_cookie(token: &str) -> HeaderValue {
    let security = &config::config().security;
    let max_age = security.cookie_expire_days * 24 * 60 * 60;
    let mut cookie = format!("{}={}; Max-Age={}; Path=/; HttpOnly", TOKEN_COOKIE, token, max_age);
    if security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie_header(cookie)
}

/// `Set-Cookie` value that overwrites the token and expires it almost immediately
pub fn expired_cookie() -> HeaderValue {
    cookie_header(format!("{}=none; Max-Age=10; Path=/; HttpOnly", TOKEN_COOKIE))
}

fn cookie_header(cookie: String) -> HeaderValue {
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("token=none; Max-Age=0; Path=/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn token_cookie_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn logged_out_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=none"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn issued_cookie_is_http_only() {
        let cookie = token_cookie("abc");
        let text = cookie.to_str().unwrap();
        assert!(text.starts_with("token=abc;"));
        assert!(text.contains("HttpOnly"));
        assert!(expired_cookie().to_str().unwrap().starts_with("token=none"));
    }
}
