//! Accounts, author profiles and token authentication.
//!
//! Every user owns exactly one author profile and at most one token.
//! Other modules guard their handlers with [`AuthUser`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use quill_db::Database;
use quill_kernel::settings::AuthSettings;
use quill_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub mod extract;
pub mod models;
pub mod password;
mod routes;
pub mod store;

pub use extract::AuthUser;
pub use models::{AuthorProfile, User};
use routes::AuthState;

pub struct AuthModule {
    state: AuthState,
}

impl AuthModule {
    pub fn new(db: Database, settings: AuthSettings) -> Self {
        Self {
            state: AuthState { db, settings },
        }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            min_password_length = self.state.settings.min_password_length,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(routes::register))
            .route("/login", post(routes::login))
            .route("/logout", post(routes::logout))
            .route("/user", get(routes::current_user))
            .route("/check", get(routes::check_auth))
            .route(
                "/profile",
                get(routes::get_profile)
                    .put(routes::update_profile)
                    .patch(routes::update_profile),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let token_auth = json!([{ "tokenAuth": [] }]);
        let error = json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });
        let session = json!({
            "description": "Session with token",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Session" } } }
        });

        Some(json!({
            "paths": {
                "/register": { "post": {
                    "summary": "Register a user and their author profile",
                    "tags": ["Auth"],
                    "requestBody": { "required": true, "content": { "application/json": {
                        "schema": { "$ref": "#/components/schemas/Register" } } } },
                    "responses": { "201": session.clone(), "400": error.clone() }
                } },
                "/login": { "post": {
                    "summary": "Exchange credentials for a token",
                    "tags": ["Auth"],
                    "requestBody": { "required": true, "content": { "application/json": {
                        "schema": { "$ref": "#/components/schemas/Login" } } } },
                    "responses": { "200": session.clone(), "400": error.clone() }
                } },
                "/logout": { "post": {
                    "summary": "Revoke the caller's token",
                    "tags": ["Auth"], "security": token_auth.clone(),
                    "responses": { "200": { "description": "Logged out" }, "401": error.clone() }
                } },
                "/user": { "get": {
                    "summary": "Current user with author profile",
                    "tags": ["Auth"], "security": token_auth.clone(),
                    "responses": { "200": { "description": "Current user" }, "401": error.clone() }
                } },
                "/check": { "get": {
                    "summary": "Check that the caller is authenticated",
                    "tags": ["Auth"], "security": token_auth.clone(),
                    "responses": { "200": { "description": "Authenticated" }, "401": error.clone() }
                } },
                "/profile": {
                    "get": {
                        "summary": "Caller's author profile",
                        "tags": ["Auth"], "security": token_auth.clone(),
                        "responses": { "200": { "description": "Author profile", "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/AuthorProfile" } } } }, "401": error.clone() }
                    },
                    "patch": {
                        "summary": "Update the caller's author profile",
                        "tags": ["Auth"], "security": token_auth.clone(),
                        "responses": { "200": { "description": "Updated" }, "400": error.clone(), "401": error.clone() }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Register": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string", "minLength": 8 },
                            "password_confirm": { "type": "string" },
                            "first_name": { "type": "string" },
                            "last_name": { "type": "string" },
                            "bio": { "type": "string", "maxLength": 500 },
                            "website": { "type": "string" },
                            "twitter_handle": { "type": "string", "maxLength": 100 }
                        },
                        "required": ["username", "email", "password", "password_confirm"]
                    },
                    "Login": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string" }
                        },
                        "required": ["username", "password"]
                    },
                    "AuthorProfile": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "username": { "type": "string" },
                            "email": { "type": "string" },
                            "first_name": { "type": "string" },
                            "last_name": { "type": "string" },
                            "bio": { "type": "string" },
                            "profile_picture": { "type": "string", "nullable": true },
                            "website": { "type": "string" },
                            "twitter_handle": { "type": "string" }
                        }
                    },
                    "Session": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string" },
                            "user": { "type": "object" },
                            "author": { "$ref": "#/components/schemas/AuthorProfile" },
                            "token": { "type": "string" }
                        },
                        "required": ["message", "user", "author", "token"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_init",
        up: r#"
            CREATE TABLE users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                username      TEXT NOT NULL UNIQUE CHECK (username != ''),
                email         TEXT NOT NULL UNIQUE COLLATE NOCASE CHECK (email != ''),
                first_name    TEXT NOT NULL DEFAULT '',
                last_name     TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                is_active     INTEGER NOT NULL DEFAULT 1,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE authors (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
                bio             TEXT NOT NULL DEFAULT '',
                profile_picture TEXT,
                website         TEXT NOT NULL DEFAULT '',
                twitter_handle  TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE auth_tokens (
                key        TEXT PRIMARY KEY,
                user_id    INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            "#,
    }]
}

pub fn create_module(db: Database, settings: AuthSettings) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(db, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Database::in_memory().await.unwrap();
        let module = AuthModule::new(db.clone(), AuthSettings::default());
        let migrations: Vec<_> = module
            .migrations()
            .into_iter()
            .map(|m| ("auth".to_string(), m))
            .collect();
        db.migrate(&migrations).await.unwrap();
        module.routes()
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn registration(username: &str, email: &str) -> Value {
        json!({
            "username": username,
            "email": email,
            "password": "s3cret-pass",
            "password_confirm": "s3cret-pass",
            "first_name": "Grace",
            "bio": "Compiler writer"
        })
    }

    #[tokio::test]
    async fn register_then_login_returns_the_same_token() {
        let app = app().await;

        let (status, body) = call(&app, "POST", "/register", None, Some(registration("grace", "grace@example.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["username"], "grace");
        assert!(body["user"].get("password_hash").is_none());
        assert_eq!(body["author"]["bio"], "Compiler writer");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "grace", "password": "s3cret-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], token.as_str());
    }

    #[tokio::test]
    async fn registration_validates_passwords_and_uniqueness() {
        let app = app().await;

        let mut mismatched = registration("grace", "grace@example.com");
        mismatched["password_confirm"] = json!("different-pass");
        let (status, body) = call(&app, "POST", "/register", None, Some(mismatched)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"][0]["field"], "password");

        call(&app, "POST", "/register", None, Some(registration("grace", "grace@example.com"))).await;
        let (status, body) = call(&app, "POST", "/register", None, Some(registration("hopper", "grace@example.com"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"][0]["field"], "email");
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let app = app().await;
        call(&app, "POST", "/register", None, Some(registration("grace", "grace@example.com"))).await;

        let (status, body) = call(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "grace", "password": "wrong-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Unable to login with provided credentials.");

        let (status, _) = call(&app, "POST", "/login", None, Some(json!({ "username": "grace" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let app = app().await;
        let (_, body) = call(&app, "POST", "/register", None, Some(registration("grace", "grace@example.com"))).await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", "/check", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["author_profile"]["username"], "grace");

        let (status, _) = call(&app, "POST", "/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "GET", "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_patch_updates_only_given_fields() {
        let app = app().await;
        let (_, body) = call(&app, "POST", "/register", None, Some(registration("grace", "grace@example.com"))).await;
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "PATCH",
            "/profile",
            Some(&token),
            Some(json!({ "website": "https://grace.dev", "last_name": "Hopper" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["last_name"], "Hopper");
        assert_eq!(body["user"]["author_profile"]["website"], "https://grace.dev");
        assert_eq!(body["user"]["author_profile"]["bio"], "Compiler writer");

        let (status, _) = call(&app, "GET", "/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
