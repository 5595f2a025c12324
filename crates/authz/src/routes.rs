use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use quill_db::Database;
use quill_http::{AppError, JsonBody};
use quill_kernel::settings::AuthSettings;
use secrecy::Secret;
use serde_json::{json, Value};

use crate::extract::AuthUser;
use crate::models::{
    LoginRequest, NewUser, ProfileUpdate, RegisterRequest, SessionResponse, UserDetail,
};
use crate::{password, store};

const MAX_BIO_CHARS: usize = 500;
const MAX_TWITTER_HANDLE_CHARS: usize = 100;

#[derive(Clone, FromRef)]
pub struct AuthState {
    pub db: Database,
    pub settings: AuthSettings,
}

fn field_error(field: &str, error: &str) -> Value {
    json!({ "field": field, "error": error })
}

pub(crate) async fn register(
    State(state): State<AuthState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let mut errors = validate_registration(&request, &state.settings);

    if errors.is_empty() {
        if store::username_exists(&state.db, &request.username)
            .await
            .context("failed to check username")?
        {
            errors.push(field_error("username", "A user with that username already exists."));
        }
        if store::email_exists(&state.db, &request.email)
            .await
            .context("failed to check email")?
        {
            errors.push(field_error("email", "A user with this email already exists."));
        }
    }

    if !errors.is_empty() {
        return Err(AppError::bad_request_with(errors, "Registration failed."));
    }

    let password_hash = password::hash_password(Secret::new(request.password))
        .await
        .context("failed to hash password")?;

    let user = store::create_user(
        &state.db,
        NewUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            first_name: request.first_name,
            last_name: request.last_name,
            password_hash,
            bio: request.bio,
            website: request.website,
            twitter_handle: request.twitter_handle,
            profile_picture: request.profile_picture,
        },
    )
    .await
    .map_err(|e| match e {
        // Lost a race with a concurrent registration.
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::bad_request_with(vec![taken_field(db.message())], "Registration failed.")
        }
        other => AppError::Internal(anyhow::Error::new(other).context("failed to create user")),
    })?;

    let token = store::get_or_create_token(&state.db, user.id)
        .await
        .context("failed to issue token")?;
    let author = store::get_or_create_author(&state.db, user.id)
        .await
        .context("failed to load author profile")?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "User registered successfully",
            user,
            author,
            token,
        }),
    ))
}

/// Field error for a unique-constraint failure on `users`.
fn taken_field(constraint_message: &str) -> Value {
    if constraint_message.contains("users.email") {
        field_error("email", "A user with this email already exists.")
    } else {
        field_error("username", "A user with that username already exists.")
    }
}

fn validate_registration(request: &RegisterRequest, settings: &AuthSettings) -> Vec<Value> {
    let mut errors = Vec::new();

    if request.username.trim().is_empty() {
        errors.push(field_error("username", "This field is required."));
    }
    let email = request.email.trim();
    if email.is_empty() {
        errors.push(field_error("email", "This field is required."));
    } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.push(field_error("email", "Enter a valid email address."));
    }
    if request.password.chars().count() < settings.min_password_length {
        errors.push(field_error(
            "password",
            &format!(
                "Ensure this field has at least {} characters.",
                settings.min_password_length
            ),
        ));
    } else if request.password != request.password_confirm {
        errors.push(field_error("password", "Passwords do not match."));
    }
    if request.bio.chars().count() > MAX_BIO_CHARS {
        errors.push(field_error("bio", "Ensure this field has no more than 500 characters."));
    }
    if request.twitter_handle.chars().count() > MAX_TWITTER_HANDLE_CHARS {
        errors.push(field_error(
            "twitter_handle",
            "Ensure this field has no more than 100 characters.",
        ));
    }

    errors
}

pub(crate) async fn login(
    State(state): State<AuthState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(AppError::bad_request("Must include 'username' and 'password'."));
    };
    if username.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Must include 'username' and 'password'."));
    }

    let user = store::find_user_by_username(&state.db, &username)
        .await
        .context("failed to look up user")?;

    let verified = password::verify_password(
        user.as_ref().map(|u| u.password_hash.clone()),
        Secret::new(password),
    )
    .await
    .context("failed to verify password")?;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::info!(%username, "login rejected");
            return Err(AppError::bad_request("Unable to login with provided credentials."));
        }
    };
    if !user.is_active {
        return Err(AppError::bad_request("User account is disabled."));
    }

    let token = store::get_or_create_token(&state.db, user.id)
        .await
        .context("failed to issue token")?;
    let author = store::get_or_create_author(&state.db, user.id)
        .await
        .context("failed to load author profile")?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(SessionResponse {
        message: "Login successful",
        user,
        author,
        token,
    }))
}

pub(crate) async fn logout(
    State(state): State<AuthState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    store::delete_token(&state.db, user.id)
        .await
        .context("failed to delete token")?;

    tracing::info!(user_id = user.id, "user logged out");
    Ok(Json(json!({ "message": "Logout successful" })))
}

pub(crate) async fn current_user(
    State(state): State<AuthState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserDetail>, AppError> {
    Ok(Json(user_detail(&state.db, user).await?))
}

pub(crate) async fn check_auth(
    State(state): State<AuthState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let detail = user_detail(&state.db, user).await?;
    Ok(Json(json!({ "authenticated": true, "user": detail })))
}

pub(crate) async fn get_profile(
    State(state): State<AuthState>,
    AuthUser(user): AuthUser,
) -> Result<Json<crate::models::AuthorProfile>, AppError> {
    let profile = store::get_or_create_author(&state.db, user.id)
        .await
        .context("failed to load author profile")?;
    Ok(Json(profile))
}

pub(crate) async fn update_profile(
    State(state): State<AuthState>,
    AuthUser(user): AuthUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    let mut errors = Vec::new();
    if update.bio.as_ref().is_some_and(|bio| bio.chars().count() > MAX_BIO_CHARS) {
        errors.push(field_error("bio", "Ensure this field has no more than 500 characters."));
    }
    if update
        .twitter_handle
        .as_ref()
        .is_some_and(|handle| handle.chars().count() > MAX_TWITTER_HANDLE_CHARS)
    {
        errors.push(field_error(
            "twitter_handle",
            "Ensure this field has no more than 100 characters.",
        ));
    }
    if !errors.is_empty() {
        return Err(AppError::bad_request_with(errors, "Profile update failed."));
    }

    store::update_profile(&state.db, user.id, &update)
        .await
        .context("failed to update profile")?;

    // Re-read so the reply reflects the new first/last name.
    let user = store::find_user_by_id(&state.db, user.id)
        .await
        .context("failed to reload user")?
        .ok_or_else(|| AppError::not_found("User not found."))?;
    let detail = user_detail(&state.db, user).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": detail,
    })))
}

async fn user_detail(db: &Database, user: crate::models::User) -> Result<UserDetail, AppError> {
    let author_profile = store::find_author(db, user.id)
        .await
        .context("failed to load author profile")?;
    Ok(UserDetail {
        user,
        author_profile,
    })
}
