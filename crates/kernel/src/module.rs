use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// Borrowed view of the application state handed to lifecycle hooks.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

/// A mountable slice of the API.
///
/// Every hook has a no-op default, so a module only overrides what it needs.
#[async_trait]
pub trait Module: Send + Sync {
    /// Path segment the module is served under, unique per registry.
    fn name(&self) -> &'static str;

    /// Prepare backing resources. Runs before the listener is bound.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handlers relative to `{api_prefix}/{name}`.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI `paths`/`components` fragment, with paths relative to the mount point.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Runs once all modules are initialized.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on shutdown, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
