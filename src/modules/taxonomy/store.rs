use quill_db::Database;
use serde::Serialize;
use sqlx::FromRow;

use super::Taxonomy;
use crate::utils::slugify;

/// A category or tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Term {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

pub async fn list(db: &Database, kind: Taxonomy) -> Result<Vec<Term>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT id, name, slug FROM {} ORDER BY name COLLATE NOCASE",
        kind.table()
    ))
    .fetch_all(db.pool())
    .await
}

pub async fn create(
    db: &Database,
    kind: Taxonomy,
    name: &str,
    slug: &str,
) -> Result<Term, sqlx::Error> {
    sqlx::query_as(&format!(
        "INSERT INTO {} (name, slug) VALUES (?, ?) RETURNING id, name, slug",
        kind.table()
    ))
    .bind(name)
    .bind(slug)
    .fetch_one(db.pool())
    .await
}

pub async fn find_by_slug(
    db: &Database,
    kind: Taxonomy,
    slug: &str,
) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT id, name, slug FROM {} WHERE slug = ?", kind.table()))
        .bind(slug)
        .fetch_optional(db.pool())
        .await
}

pub async fn find_by_id(db: &Database, kind: Taxonomy, id: i64) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT id, name, slug FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .fetch_optional(db.pool())
        .await
}

/// Term named `name` (case-insensitive), created with a slugified slug if missing.
pub async fn get_or_create_by_name(
    db: &Database,
    kind: Taxonomy,
    name: &str,
) -> Result<Term, sqlx::Error> {
    let table = kind.table();
    sqlx::query(&format!(
        "INSERT INTO {table} (name, slug) VALUES (?, ?) ON CONFLICT DO NOTHING"
    ))
    .bind(name)
    .bind(slugify(name))
    .execute(db.pool())
    .await?;

    sqlx::query_as(&format!(
        "SELECT id, name, slug FROM {table} WHERE name = ? COLLATE NOCASE OR slug = ? LIMIT 1"
    ))
    .bind(name)
    .bind(slugify(name))
    .fetch_one(db.pool())
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> Database {
        let db = Database::in_memory().await.unwrap();
        let migrations: Vec<_> = [Taxonomy::Category, Taxonomy::Tag]
            .into_iter()
            .flat_map(|kind| {
                kind.migrations()
                    .into_iter()
                    .map(move |m| (kind.module_name().to_string(), m))
            })
            .collect();
        db.migrate(&migrations).await.unwrap();
        db
    }

    #[tokio::test]
    async fn lists_by_name() {
        let db = db().await;
        create(&db, Taxonomy::Category, "Science", "science").await.unwrap();
        create(&db, Taxonomy::Category, "art", "art").await.unwrap();

        let names: Vec<_> = list(&db, Taxonomy::Category)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["art", "Science"]);
        assert!(list(&db, Taxonomy::Tag).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let db = db().await;
        create(&db, Taxonomy::Tag, "Rust", "rust").await.unwrap();

        let err = create(&db, Taxonomy::Tag, "Rust lang", "rust").await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_unique_violation()));
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_terms() {
        let db = db().await;
        let first = get_or_create_by_name(&db, Taxonomy::Tag, "Space Travel").await.unwrap();
        assert_eq!(first.slug, "space-travel");

        let again = get_or_create_by_name(&db, Taxonomy::Tag, "space travel").await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(list(&db, Taxonomy::Tag).await.unwrap().len(), 1);

        assert_eq!(
            find_by_slug(&db, Taxonomy::Tag, "space-travel").await.unwrap(),
            Some(first.clone())
        );
        assert_eq!(find_by_id(&db, Taxonomy::Tag, first.id).await.unwrap(), Some(first));
    }
}
