pub mod generator;
pub mod posts;
pub mod taxonomy;
pub mod uploads;

use std::sync::Arc;

use quill_db::Database;
use quill_kernel::{settings::Settings, ModuleRegistry};

use generator::ContentGenerator;
use taxonomy::Taxonomy;

/// Register the core and project modules with the registry.
pub fn register_all(
    registry: &mut ModuleRegistry,
    db: &Database,
    settings: &Settings,
    generator: Arc<dyn ContentGenerator>,
) {
    registry.register_core(quill_db::create_module(db.clone()));
    registry.register_core(quill_authz::create_module(db.clone(), settings.auth.clone()));

    registry.register_custom(posts::create_module(db.clone()));
    registry.register_custom(posts::create_my_posts_module(db.clone()));
    registry.register_custom(taxonomy::create_module(db.clone(), Taxonomy::Category));
    registry.register_custom(taxonomy::create_module(db.clone(), Taxonomy::Tag));
    registry.register_custom(uploads::create_module(db.clone(), settings.media.clone()));
    registry.register_custom(generator::create_module(
        generator,
        settings.generator.api_key.is_some(),
    ));
}

#[cfg(test)]
pub(crate) mod test_support {
    use quill_authz::models::NewUser;
    use quill_authz::store;
    use quill_db::Database;
    use quill_kernel::Migration;

    use super::{posts, Taxonomy};

    /// In-memory database with every table the app modules use.
    pub(crate) async fn database() -> Database {
        let db = Database::in_memory().await.unwrap();

        let mut migrations: Vec<(String, Migration)> = quill_authz::create_module(db.clone(), Default::default())
            .migrations()
            .into_iter()
            .map(|m| ("auth".to_string(), m))
            .collect();
        for kind in [Taxonomy::Category, Taxonomy::Tag] {
            migrations.extend(
                kind.migrations()
                    .into_iter()
                    .map(|m| (kind.module_name().to_string(), m)),
            );
        }
        migrations.extend(posts::migrations().into_iter().map(|m| ("posts".to_string(), m)));

        db.migrate(&migrations).await.unwrap();
        db
    }

    async fn user(db: &Database, username: &str) -> i64 {
        store::create_user(
            db,
            NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "unused".to_string(),
                bio: String::new(),
                website: String::new(),
                twitter_handle: String::new(),
                profile_picture: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    /// Token for a freshly created user.
    pub(crate) async fn token_for(db: &Database, username: &str) -> String {
        let user_id = user(db, username).await;
        store::get_or_create_token(db, user_id).await.unwrap()
    }

    /// Author id for a freshly created user.
    pub(crate) async fn author_for(db: &Database, username: &str) -> i64 {
        let user_id = user(db, username).await;
        store::get_or_create_author(db, user_id).await.unwrap().id
    }
}
