//! Blog posts with author, category and tags.

pub mod models;
mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use quill_db::Database;
use quill_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub use models::Post;

pub struct PostsModule {
    db: Database,
}

impl PostsModule {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for PostsModule {
    fn name(&self) -> &'static str {
        "posts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "posts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_published).post(routes::create_post))
            .route("/{slug}", get(routes::get_post))
            .with_state(self.db.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });
        let post = json!({ "$ref": "#/components/schemas/Post" });
        let post_list = json!({
            "description": "Posts, newest first",
            "content": { "application/json": { "schema": { "type": "array", "items": post.clone() } } }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List published posts",
                        "tags": ["Posts"],
                        "responses": { "200": post_list }
                    },
                    "post": {
                        "summary": "Create a post",
                        "tags": ["Posts"],
                        "security": [{ "tokenAuth": [] }],
                        "requestBody": { "required": true, "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/NewPost" } } } },
                        "responses": {
                            "201": { "description": "Created", "content": { "application/json": { "schema": post.clone() } } },
                            "400": error.clone(),
                            "401": error.clone(),
                            "409": error.clone()
                        }
                    }
                },
                "/{slug}": { "get": {
                    "summary": "A published post by slug",
                    "tags": ["Posts"],
                    "parameters": [{ "name": "slug", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": {
                        "200": { "description": "Post", "content": { "application/json": { "schema": post } } },
                        "404": error
                    }
                } }
            },
            "components": {
                "schemas": {
                    "Post": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "title": { "type": "string" },
                            "slug": { "type": "string" },
                            "content": { "type": "string", "description": "HTML body" },
                            "excerpt": { "type": "string" },
                            "cover_image": { "type": "string", "nullable": true },
                            "created_at": { "type": "string", "format": "date-time" },
                            "updated_at": { "type": "string", "format": "date-time" },
                            "is_published": { "type": "boolean" },
                            "author": { "$ref": "#/components/schemas/AuthorProfile" },
                            "category": { "$ref": "#/components/schemas/Term" },
                            "tags": { "type": "array", "items": { "$ref": "#/components/schemas/Term" } }
                        }
                    },
                    "NewPost": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "maxLength": 200 },
                            "content": { "type": "string" },
                            "excerpt": { "type": "string", "maxLength": 500 },
                            "slug": { "type": "string" },
                            "cover_image": { "type": "string" },
                            "category": { "type": "string", "description": "Category slug" },
                            "tags": { "type": "array", "items": { "type": "string" }, "description": "Tag names" },
                            "is_published": { "type": "boolean", "default": false }
                        },
                        "required": ["title", "content"]
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
            CREATE TABLE posts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                title        TEXT NOT NULL CHECK (length(title) <= 200),
                slug         TEXT NOT NULL UNIQUE,
                content      TEXT NOT NULL,
                excerpt      TEXT NOT NULL DEFAULT '' CHECK (length(excerpt) <= 500),
                cover_image  TEXT,
                author_id    INTEGER REFERENCES authors (id) ON DELETE SET NULL,
                category_id  INTEGER REFERENCES categories (id) ON DELETE SET NULL,
                is_published INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX posts_published_created ON posts (is_published, created_at);
            CREATE INDEX posts_author ON posts (author_id);

            CREATE TABLE post_tags (
                post_id INTEGER NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
                tag_id  INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, tag_id)
            );
            "#,
    }]
}

pub fn create_module(db: Database) -> Arc<dyn Module> {
    Arc::new(PostsModule::new(db))
}

/// The caller's own posts at `/api/my-posts`, drafts included.
pub struct MyPostsModule {
    db: Database,
}

impl MyPostsModule {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Module for MyPostsModule {
    fn name(&self) -> &'static str {
        "my-posts"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_mine))
            .with_state(self.db.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": { "get": {
                    "summary": "The caller's posts, drafts included",
                    "tags": ["Posts"],
                    "security": [{ "tokenAuth": [] }],
                    "responses": {
                        "200": { "description": "Posts, newest first", "content": { "application/json": {
                            "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Post" } } } } },
                        "401": { "description": "Error", "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/ErrorResponse" } } } }
                    }
                } }
            }
        }))
    }
}

pub fn create_my_posts_module(db: Database) -> Arc<dyn Module> {
    Arc::new(MyPostsModule::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::taxonomy::{store as taxonomy, Taxonomy};
    use crate::modules::test_support;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct TestApp {
        db: Database,
        router: Router,
        token: String,
    }

    async fn app() -> TestApp {
        let db = test_support::database().await;
        let token = test_support::token_for(&db, "writer").await;
        let router = Router::new()
            .nest("/posts", PostsModule::new(db.clone()).routes())
            .nest("/my-posts", MyPostsModule::new(db.clone()).routes());
        TestApp { db, router, token }
    }

    impl TestApp {
        async fn call(&self, method: &str, uri: &str, authed: bool, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if authed {
                request = request.header(header::AUTHORIZATION, format!("Token {}", self.token));
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn create_post_with_category_and_tags() {
        let app = app().await;
        taxonomy::create(&app.db, Taxonomy::Category, "Space", "space").await.unwrap();

        let (status, body) = app
            .call(
                "POST",
                "/posts",
                true,
                Some(json!({
                    "title": "Life on Mars?",
                    "content": "<article>Red dust</article>",
                    "excerpt": "A look at the red planet.",
                    "category": "space",
                    "tags": ["Mars", "astronomy", "Mars"],
                    "is_published": true
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slug"], "life-on-mars");
        assert_eq!(body["author"]["username"], "writer");
        assert_eq!(body["category"]["slug"], "space");
        assert_eq!(body["tags"].as_array().unwrap().len(), 2);
        assert_eq!(body["cover_image"], Value::Null);

        let (status, body) = app.call("GET", "/posts/life-on-mars", false, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Life on Mars?");
    }

    #[tokio::test]
    async fn drafts_are_only_visible_to_their_author() {
        let app = app().await;
        let draft = json!({ "title": "Work in progress", "content": "<p>soon</p>" });
        let (status, _) = app.call("POST", "/posts", true, Some(draft)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = app.call("GET", "/posts", false, None).await;
        assert_eq!(body, json!([]));

        let (status, _) = app.call("GET", "/posts/work-in-progress", false, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.call("GET", "/my-posts", true, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["slug"], "work-in-progress");
        assert_eq!(body[0]["is_published"], false);
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let app = app().await;
        let post = json!({ "title": "Same title", "content": "<p>x</p>" });
        app.call("POST", "/posts", true, Some(post.clone())).await;

        let (status, body) = app.call("POST", "/posts", true, Some(post)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["details"][0]["field"], "slug");
    }

    #[tokio::test]
    async fn unknown_category_and_missing_auth_are_rejected() {
        let app = app().await;

        let post = json!({ "title": "Orphan", "content": "<p>x</p>", "category": "nowhere" });
        let (status, body) = app.call("POST", "/posts", true, Some(post.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"][0]["field"], "category");

        let (status, _) = app.call("POST", "/posts", false, Some(post)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.call("GET", "/my-posts", false, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
