//! Queries over users, author profiles and tokens.

use quill_db::Database;
use rand::Rng;

use crate::models::{AuthorProfile, NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, is_active, created_at";

const AUTHOR_PROFILE_SELECT: &str = r#"
    SELECT a.id, u.username, u.email, u.first_name, u.last_name,
           a.bio, a.profile_picture, a.website, a.twitter_handle
    FROM authors a
    JOIN users u ON u.id = a.user_id
"#;

/// Insert a user and its author profile atomically.
#[tracing::instrument(name = "Storing new user", skip(db, new_user), fields(username = %new_user.username))]
pub async fn create_user(db: &Database, new_user: NewUser) -> Result<User, sqlx::Error> {
    let mut tx = db.pool().begin().await?;

    let user: User = sqlx::query_as(&format!(
        "INSERT INTO users (username, email, first_name, last_name, password_hash)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.password_hash)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO authors (user_id, bio, website, twitter_handle, profile_picture)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&new_user.bio)
    .bind(&new_user.website)
    .bind(&new_user.twitter_handle)
    .bind(&new_user.profile_picture)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user)
}

pub async fn find_user_by_username(
    db: &Database,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
        .bind(username)
        .fetch_optional(db.pool())
        .await
}

pub async fn find_user_by_id(db: &Database, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(db.pool())
        .await
}

pub async fn username_exists(db: &Database, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(db.pool())
        .await
}

pub async fn email_exists(db: &Database, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE)")
        .bind(email)
        .fetch_one(db.pool())
        .await
}

/// Author profile for `user_id`, created empty if the user has none yet.
pub async fn get_or_create_author(db: &Database, user_id: i64) -> Result<AuthorProfile, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO authors (user_id) VALUES (?)")
        .bind(user_id)
        .execute(db.pool())
        .await?;

    sqlx::query_as(&format!("{AUTHOR_PROFILE_SELECT} WHERE a.user_id = ?"))
        .bind(user_id)
        .fetch_one(db.pool())
        .await
}

pub async fn find_author(db: &Database, user_id: i64) -> Result<Option<AuthorProfile>, sqlx::Error> {
    sqlx::query_as(&format!("{AUTHOR_PROFILE_SELECT} WHERE a.user_id = ?"))
        .bind(user_id)
        .fetch_optional(db.pool())
        .await
}

/// Author profile by the author's own id
pub async fn find_author_by_id(
    db: &Database,
    author_id: i64,
) -> Result<Option<AuthorProfile>, sqlx::Error> {
    sqlx::query_as(&format!("{AUTHOR_PROFILE_SELECT} WHERE a.id = ?"))
        .bind(author_id)
        .fetch_optional(db.pool())
        .await
}

/// Apply the present fields of `update` to the user and their profile.
pub async fn update_profile(
    db: &Database,
    user_id: i64,
    update: &ProfileUpdate,
) -> Result<AuthorProfile, sqlx::Error> {
    let mut tx = db.pool().begin().await?;

    sqlx::query("INSERT OR IGNORE INTO authors (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE users
         SET first_name = COALESCE(?, first_name),
             last_name  = COALESCE(?, last_name)
         WHERE id = ?",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE authors
         SET bio             = COALESCE(?, bio),
             website         = COALESCE(?, website),
             twitter_handle  = COALESCE(?, twitter_handle),
             profile_picture = COALESCE(?, profile_picture)
         WHERE user_id = ?",
    )
    .bind(&update.bio)
    .bind(&update.website)
    .bind(&update.twitter_handle)
    .bind(&update.profile_picture)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let profile = sqlx::query_as(&format!("{AUTHOR_PROFILE_SELECT} WHERE a.user_id = ?"))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(profile)
}

/// The user's token key, issuing one if they have none.
pub async fn get_or_create_token(db: &Database, user_id: i64) -> Result<String, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO auth_tokens (key, user_id) VALUES (?, ?)")
        .bind(generate_token_key())
        .bind(user_id)
        .execute(db.pool())
        .await?;

    sqlx::query_scalar("SELECT key FROM auth_tokens WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db.pool())
        .await
}

pub async fn user_for_token(db: &Database, key: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(
        "SELECT u.id, u.username, u.email, u.first_name, u.last_name,
                u.password_hash, u.is_active, u.created_at
         FROM auth_tokens t
         JOIN users u ON u.id = t.user_id
         WHERE t.key = ?",
    )
    .bind(key)
    .fetch_optional(db.pool())
    .await
}

/// Returns whether a token was deleted.
pub async fn delete_token(db: &Database, user_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(db.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 40 lowercase hex characters from 20 random bytes.
pub fn generate_token_key() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
