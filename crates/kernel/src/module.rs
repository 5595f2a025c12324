use async_trait::async_trait;
use axum::Router;

/// Context handed to modules during initialization and startup
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// A named SQL script contributed by a module.
///
/// `up` may hold several statements; it runs once and is then recorded
/// as applied under `(module name, id)`.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Contract every Quill module implements
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module, also its mount point under `/api`
    fn name(&self) -> &'static str;

    /// Called during application startup, after migrations have run
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Router for this module's routes, mounted under `/api/{module_name}`.
    ///
    /// Modules that need shared state attach it here with `with_state`,
    /// so the returned router is always state-free.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) for this module.
    /// Paths are relative to the module mount point.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Migrations contributed by this module, applied in id order
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Called once every module is initialized, before the server accepts requests
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called during shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
