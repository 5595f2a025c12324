use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account row. The password hash never leaves the crate boundary in JSON.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub is_active: bool,
    #[serde(skip)]
    pub created_at: String,
}

/// Public author profile, joined with the owning user's identity fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AuthorProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub website: String,
    pub twitter_handle: String,
}

/// User with their author profile embedded
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub author_profile: Option<AuthorProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub twitter_handle: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Partial profile update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub website: Option<String>,
    pub twitter_handle: Option<String>,
    pub profile_picture: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Fields needed to insert a user together with its author profile
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub bio: String,
    pub website: String,
    pub twitter_handle: String,
    pub profile_picture: Option<String>,
}

/// Reply to registration and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub user: User,
    pub author: AuthorProfile,
    pub token: String,
}
