use quill_authz::AuthorProfile;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::modules::taxonomy::Term;

/// A `posts` row before its relations are resolved.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A post as served over HTTP, with author, category and tags embedded.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// HTML body
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_published: bool,
    pub author: Option<AuthorProfile>,
    pub category: Option<Term>,
    pub tags: Vec<Term>,
}

/// Request body for creating a post. `category` is a category slug and
/// `tags` are tag names.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Validated values ready to insert.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub is_published: bool,
}
