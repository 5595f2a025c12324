//! Post queries and relation loading.

use quill_db::Database;

use super::models::{Post, PostDraft, PostRow};
use crate::modules::taxonomy::{store as taxonomy, Taxonomy, Term};

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, cover_image, author_id, \
     category_id, is_published, created_at, updated_at";

/// Insert the post and its tag links in one transaction.
#[tracing::instrument(name = "Storing new post", skip(db, draft), fields(slug = %draft.slug))]
pub async fn insert_post(db: &Database, draft: &PostDraft) -> Result<PostRow, sqlx::Error> {
    let mut tx = db.pool().begin().await?;

    let row: PostRow = sqlx::query_as(&format!(
        "INSERT INTO posts (title, slug, content, excerpt, cover_image, author_id, category_id, is_published)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {POST_COLUMNS}"
    ))
    .bind(&draft.title)
    .bind(&draft.slug)
    .bind(&draft.content)
    .bind(&draft.excerpt)
    .bind(&draft.cover_image)
    .bind(draft.author_id)
    .bind(draft.category_id)
    .bind(draft.is_published)
    .fetch_one(&mut *tx)
    .await?;

    for &tag_id in &draft.tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(row.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(row)
}

/// Published posts, newest first.
pub async fn list_published(db: &Database) -> Result<Vec<PostRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE is_published = 1
         ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(db.pool())
    .await
}

/// All of an author's posts, drafts included, newest first.
pub async fn list_by_author(db: &Database, author_id: i64) -> Result<Vec<PostRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE author_id = ?
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(author_id)
    .fetch_all(db.pool())
    .await
}

pub async fn find_published_by_slug(
    db: &Database,
    slug: &str,
) -> Result<Option<PostRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE slug = ? AND is_published = 1"
    ))
    .bind(slug)
    .fetch_optional(db.pool())
    .await
}

pub async fn slug_exists(db: &Database, slug: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = ?)")
        .bind(slug)
        .fetch_one(db.pool())
        .await
}

pub async fn tags_for_post(db: &Database, post_id: i64) -> Result<Vec<Term>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.id, t.name, t.slug
         FROM post_tags pt
         JOIN tags t ON t.id = pt.tag_id
         WHERE pt.post_id = ?
         ORDER BY t.name COLLATE NOCASE",
    )
    .bind(post_id)
    .fetch_all(db.pool())
    .await
}

/// Resolve author, category and tags for a row.
pub async fn load_relations(db: &Database, row: PostRow) -> Result<Post, sqlx::Error> {
    let author = match row.author_id {
        Some(author_id) => quill_authz::store::find_author_by_id(db, author_id).await?,
        None => None,
    };
    let category = match row.category_id {
        Some(category_id) => taxonomy::find_by_id(db, Taxonomy::Category, category_id).await?,
        None => None,
    };
    let tags = tags_for_post(db, row.id).await?;

    Ok(Post {
        id: row.id,
        title: row.title,
        slug: row.slug,
        content: row.content,
        excerpt: row.excerpt,
        cover_image: row.cover_image,
        created_at: row.created_at,
        updated_at: row.updated_at,
        is_published: row.is_published,
        author,
        category,
        tags,
    })
}

pub async fn load_all(db: &Database, rows: Vec<PostRow>) -> Result<Vec<Post>, sqlx::Error> {
    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        posts.push(load_relations(db, row).await?);
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::test_support;

    fn draft(slug: &str, author_id: i64, is_published: bool) -> PostDraft {
        PostDraft {
            title: format!("Post {slug}"),
            slug: slug.to_string(),
            content: "<p>body</p>".to_string(),
            excerpt: "summary".to_string(),
            cover_image: None,
            author_id,
            category_id: None,
            tag_ids: Vec::new(),
            is_published,
        }
    }

    #[tokio::test]
    async fn published_listing_hides_drafts() {
        let db = test_support::database().await;
        let author = test_support::author_for(&db, "writer").await;

        insert_post(&db, &draft("first", author, true)).await.unwrap();
        insert_post(&db, &draft("hidden", author, false)).await.unwrap();
        insert_post(&db, &draft("second", author, true)).await.unwrap();

        let slugs: Vec<_> = list_published(&db).await.unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, ["second", "first"]);

        assert!(find_published_by_slug(&db, "hidden").await.unwrap().is_none());
        assert_eq!(list_by_author(&db, author).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_slugs_violate_uniqueness() {
        let db = test_support::database().await;
        let author = test_support::author_for(&db, "writer").await;
        insert_post(&db, &draft("same", author, true)).await.unwrap();

        let err = insert_post(&db, &draft("same", author, true)).await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_unique_violation()));
        assert!(slug_exists(&db, "same").await.unwrap());
    }

    #[tokio::test]
    async fn relations_are_loaded() {
        let db = test_support::database().await;
        let author = test_support::author_for(&db, "writer").await;
        let category = taxonomy::create(&db, Taxonomy::Category, "Space", "space").await.unwrap();
        let rust = taxonomy::get_or_create_by_name(&db, Taxonomy::Tag, "Rust").await.unwrap();
        let astro = taxonomy::get_or_create_by_name(&db, Taxonomy::Tag, "Astronomy").await.unwrap();

        let mut new_post = draft("orbit", author, true);
        new_post.category_id = Some(category.id);
        new_post.tag_ids = vec![rust.id, astro.id, rust.id];
        let row = insert_post(&db, &new_post).await.unwrap();

        let post = load_relations(&db, row).await.unwrap();
        assert_eq!(post.author.unwrap().username, "writer");
        assert_eq!(post.category, Some(category));
        assert_eq!(post.tags, vec![astro, rust]);
    }
}
