//! Categories and tags share one shape: a unique name and a unique slug.

pub mod store;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use quill_authz::AuthUser;
use quill_db::Database;
use quill_http::{AppError, JsonBody};
use quill_kernel::{InitCtx, Migration, Module};
use serde::Deserialize;
use serde_json::json;

use crate::utils::{is_valid_slug, slugify};
pub use store::Term;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Tag => "tags",
        }
    }

    pub fn module_name(self) -> &'static str {
        self.table()
    }

    fn label(self) -> &'static str {
        match self {
            Taxonomy::Category => "category",
            Taxonomy::Tag => "tag",
        }
    }

    pub(crate) fn migrations(self) -> Vec<Migration> {
        let up = match self {
            Taxonomy::Category => {
                r#"
                CREATE TABLE categories (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    slug TEXT NOT NULL UNIQUE
                );
                "#
            }
            Taxonomy::Tag => {
                r#"
                CREATE TABLE tags (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    slug TEXT NOT NULL UNIQUE
                );
                "#
            }
        };
        vec![Migration { id: "001_init", up }]
    }
}

#[derive(Clone, FromRef)]
struct TaxonomyState {
    db: Database,
    kind: Taxonomy,
}

#[derive(Debug, Deserialize)]
struct NewTerm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: Option<String>,
}

pub struct TaxonomyModule {
    state: TaxonomyState,
}

impl TaxonomyModule {
    pub fn new(db: Database, kind: Taxonomy) -> Self {
        Self {
            state: TaxonomyState { db, kind },
        }
    }
}

#[async_trait]
impl Module for TaxonomyModule {
    fn name(&self) -> &'static str {
        self.state.kind.module_name()
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "taxonomy module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_terms).post(create_term))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let tag = match self.state.kind {
            Taxonomy::Category => "Categories",
            Taxonomy::Tag => "Tags",
        };
        let error = json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });
        let term = json!({ "$ref": "#/components/schemas/Term" });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": format!("List {}", self.name()),
                        "tags": [tag],
                        "responses": { "200": { "description": "Ordered by name", "content": {
                            "application/json": { "schema": { "type": "array", "items": term.clone() } } } } }
                    },
                    "post": {
                        "summary": format!("Create a {}", self.state.kind.label()),
                        "tags": [tag],
                        "security": [{ "tokenAuth": [] }],
                        "requestBody": { "required": true, "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/NewTerm" } } } },
                        "responses": {
                            "201": { "description": "Created", "content": { "application/json": { "schema": term } } },
                            "400": error.clone(),
                            "401": error.clone(),
                            "409": error
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Term": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "name": { "type": "string" },
                            "slug": { "type": "string" }
                        },
                        "required": ["id", "name", "slug"]
                    },
                    "NewTerm": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "maxLength": MAX_NAME_CHARS },
                            "slug": { "type": "string" }
                        },
                        "required": ["name"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        self.state.kind.migrations()
    }
}

async fn list_terms(State(state): State<TaxonomyState>) -> Result<Json<Vec<Term>>, AppError> {
    let terms = store::list(&state.db, state.kind)
        .await
        .with_context(|| format!("failed to list {}", state.kind.table()))?;
    Ok(Json(terms))
}

async fn create_term(
    State(state): State<TaxonomyState>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<NewTerm>,
) -> Result<(StatusCode, Json<Term>), AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request_with(
            vec![json!({ "field": "name", "error": "This field is required." })],
            "Invalid name.",
        ));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::bad_request_with(
            vec![json!({ "field": "name", "error": "Ensure this field has no more than 100 characters." })],
            "Invalid name.",
        ));
    }

    let slug = match request.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slugify(name),
    };
    if !is_valid_slug(&slug) {
        return Err(AppError::bad_request_with(
            vec![json!({ "field": "slug", "error": "Enter a valid slug of lowercase letters, numbers, underscores or hyphens." })],
            "Invalid slug.",
        ));
    }

    let term = store::create(&state.db, state.kind, name, &slug)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(
                vec![json!({ "field": "slug", "error": "already exists" })],
                format!("A {} with this name or slug already exists.", state.kind.label()),
            ),
            other => AppError::Internal(anyhow::Error::new(other).context("failed to create term")),
        })?;

    tracing::info!(
        module = state.kind.module_name(),
        term_id = term.id,
        slug = %term.slug,
        user_id = user.id,
        "term created"
    );
    Ok((StatusCode::CREATED, Json(term)))
}

pub fn create_module(db: Database, kind: Taxonomy) -> Arc<dyn Module> {
    Arc::new(TaxonomyModule::new(db, kind))
}
