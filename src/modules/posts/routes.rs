use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_authz::AuthUser;
use quill_db::Database;
use quill_http::{AppError, JsonBody};
use serde_json::{json, Value};

use super::models::{NewPost, Post, PostDraft};
use super::store;
use crate::modules::taxonomy::{store as taxonomy, Taxonomy};
use crate::utils::{is_valid_slug, slugify};

const MAX_TITLE_CHARS: usize = 200;
const MAX_EXCERPT_CHARS: usize = 500;
const MAX_TAG_CHARS: usize = 100;

fn field_error(field: &str, error: &str) -> Value {
    json!({ "field": field, "error": error })
}

pub(crate) async fn list_published(State(db): State<Database>) -> Result<Json<Vec<Post>>, AppError> {
    let rows = store::list_published(&db)
        .await
        .context("failed to list posts")?;
    let posts = store::load_all(&db, rows)
        .await
        .context("failed to load post relations")?;
    Ok(Json(posts))
}

pub(crate) async fn list_mine(
    State(db): State<Database>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Post>>, AppError> {
    let author = quill_authz::store::get_or_create_author(&db, user.id)
        .await
        .context("failed to load author profile")?;
    let rows = store::list_by_author(&db, author.id)
        .await
        .context("failed to list author posts")?;
    let posts = store::load_all(&db, rows)
        .await
        .context("failed to load post relations")?;
    Ok(Json(posts))
}

pub(crate) async fn get_post(
    State(db): State<Database>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, AppError> {
    let row = store::find_published_by_slug(&db, &slug)
        .await
        .context("failed to look up post")?
        .ok_or_else(|| AppError::not_found("Post not found."))?;
    let post = store::load_relations(&db, row)
        .await
        .context("failed to load post relations")?;
    Ok(Json(post))
}

pub(crate) async fn create_post(
    State(db): State<Database>,
    AuthUser(user): AuthUser,
    JsonBody(request): JsonBody<NewPost>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let (title, slug) = validate_post(&request)?;

    if store::slug_exists(&db, &slug)
        .await
        .context("failed to check slug")?
    {
        return Err(duplicate_slug());
    }

    let category_id = match request.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => {
            let category = taxonomy::find_by_slug(&db, Taxonomy::Category, category)
                .await
                .context("failed to look up category")?
                .ok_or_else(|| {
                    AppError::bad_request_with(
                        vec![field_error("category", "Unknown category.")],
                        "Invalid post.",
                    )
                })?;
            Some(category.id)
        }
        _ => None,
    };

    let mut tag_ids = Vec::with_capacity(request.tags.len());
    for name in request.tags.iter().map(|name| name.trim()).filter(|name| !name.is_empty()) {
        let tag = taxonomy::get_or_create_by_name(&db, Taxonomy::Tag, name)
            .await
            .with_context(|| format!("failed to resolve tag {name:?}"))?;
        tag_ids.push(tag.id);
    }

    let author = quill_authz::store::get_or_create_author(&db, user.id)
        .await
        .context("failed to load author profile")?;

    let draft = PostDraft {
        title,
        slug,
        content: request.content,
        excerpt: request.excerpt.trim().to_string(),
        cover_image: request.cover_image.filter(|image| !image.trim().is_empty()),
        author_id: author.id,
        category_id,
        tag_ids,
        is_published: request.is_published,
    };

    let row = store::insert_post(&db, &draft).await.map_err(|e| match e {
        // Lost a race with a concurrent post using the same slug.
        sqlx::Error::Database(err) if err.is_unique_violation() => duplicate_slug(),
        other => AppError::Internal(anyhow::Error::new(other).context("failed to create post")),
    })?;

    tracing::info!(
        post_id = row.id,
        slug = %row.slug,
        author_id = author.id,
        is_published = row.is_published,
        "post created"
    );

    let post = store::load_relations(&db, row)
        .await
        .context("failed to load post relations")?;
    Ok((StatusCode::CREATED, Json(post)))
}

fn duplicate_slug() -> AppError {
    AppError::conflict(
        vec![field_error("slug", "post with this slug already exists.")],
        "A post with this slug already exists.",
    )
}

/// Checks field limits and returns the trimmed title and the final slug.
fn validate_post(request: &NewPost) -> Result<(String, String), AppError> {
    let mut errors = Vec::new();

    let title = request.title.trim();
    if title.is_empty() {
        errors.push(field_error("title", "This field is required."));
    } else if title.chars().count() > MAX_TITLE_CHARS {
        errors.push(field_error("title", "Ensure this field has no more than 200 characters."));
    }
    if request.content.trim().is_empty() {
        errors.push(field_error("content", "This field is required."));
    }
    if request.excerpt.trim().chars().count() > MAX_EXCERPT_CHARS {
        errors.push(field_error("excerpt", "Ensure this field has no more than 500 characters."));
    }
    if request.tags.iter().any(|tag| tag.trim().chars().count() > MAX_TAG_CHARS) {
        errors.push(field_error("tags", "Ensure each tag has no more than 100 characters."));
    }

    let slug = match request.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slugify(title),
    };
    if !title.is_empty() && !is_valid_slug(&slug) {
        errors.push(field_error(
            "slug",
            "Enter a valid slug of lowercase letters, numbers, underscores or hyphens.",
        ));
    }

    if errors.is_empty() {
        Ok((title.to_string(), slug))
    } else {
        Err(AppError::bad_request_with(errors, "Invalid post."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "<p>Hello</p>".to_string(),
            excerpt: String::new(),
            slug: None,
            cover_image: None,
            category: None,
            tags: Vec::new(),
            is_published: false,
        }
    }

    #[test]
    fn slug_defaults_to_slugified_title() {
        let (title, slug) = validate_post(&request("  A Walk on the Moon! ")).unwrap();
        assert_eq!(title, "A Walk on the Moon!");
        assert_eq!(slug, "a-walk-on-the-moon");
    }

    #[test]
    fn explicit_slug_must_be_valid() {
        let mut post = request("Moon");
        post.slug = Some("Moon Walk".to_string());
        assert!(validate_post(&post).is_err());

        post.slug = Some("moon-walk".to_string());
        assert_eq!(validate_post(&post).unwrap().1, "moon-walk");
    }

    #[test]
    fn titles_need_letters() {
        assert!(validate_post(&request("???")).is_err());
        assert!(validate_post(&request("")).is_err());
        assert_eq!(validate_post(&request("Mine")).unwrap().1, "mine");
    }

    #[test]
    fn long_fields_are_rejected() {
        assert!(validate_post(&request(&"x".repeat(201))).is_err());

        let mut post = request("Fine");
        post.excerpt = "y".repeat(501);
        assert!(validate_post(&post).is_err());
    }
}
