use anyhow::Context;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use quill_db::Database;
use quill_http::AppError;

use crate::models::User;
use crate::store;

/// The authenticated caller, resolved from `Authorization: Token <key>`.
///
/// `Bearer <key>` is accepted as well. Missing, unknown, or disabled
/// credentials reject with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))?;

        let key = token_from_header(header)
            .ok_or_else(|| AppError::unauthorized("Invalid token header."))?;

        let db = Database::from_ref(state);
        let user = store::user_for_token(&db, key)
            .await
            .context("failed to resolve auth token")?
            .ok_or_else(|| AppError::unauthorized("Invalid token."))?;

        if !user.is_active {
            return Err(AppError::unauthorized("User inactive or deleted."));
        }

        Ok(AuthUser(user))
    }
}

fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, key) = header.trim().split_once(' ')?;
    let key = key.trim();
    let known_scheme = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known_scheme && !key.is_empty() && !key.contains(' ')).then_some(key)
}
