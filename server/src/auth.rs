//! Bearer-token authentication.
//!
//! Tokens come from the `auth.users` config section; there is no session
//! issuance here.

use std::collections::HashMap;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use secrecy::ExposeSecret;

use songloom::config::ApiUser;
use songloom::ConfigError;

use crate::routes::ApiError;
use crate::state::AppState;

/// Maps bearer tokens to user ids.
#[derive(Default)]
pub struct TokenTable {
    users: HashMap<String, String>,
}

impl TokenTable {
    pub fn from_users(users: &[ApiUser]) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for user in users {
            let token = user
                .token_source()
                .resolve()
                .map_err(|source| ConfigError::Secret {
                    field: format!("auth.users[{}].token", user.user_id),
                    source,
                })?;
            table.insert(token.expose_secret(), &user.user_id);
        }
        Ok(table)
    }

    pub fn insert(&mut self, token: &str, user_id: &str) {
        self.users.insert(token.to_string(), user_id.to_string());
    }

    pub fn user_for(&self, token: &str) -> Option<&str> {
        self.users.get(token).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized("Access token required"))?;
        state
            .tokens
            .user_for(token)
            .map(|user_id| AuthUser(user_id.to_string()))
            .ok_or(ApiError::Unauthorized("Invalid or expired token"))
    }
}
