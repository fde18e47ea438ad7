//! Folio book management service.
//!
//! [`AppContext`] is built once from [`Settings`]; the modules in
//! [`modules`] are registered against it and served by `folio-http`.

pub mod context;
pub mod modules;

use anyhow::Context;
use folio_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use context::AppContext;

/// Registry with every module wired to `ctx`.
pub fn build_registry(ctx: &AppContext) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, ctx)?;
    Ok(registry)
}

/// Bootstrap the service and serve until shutdown.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    folio_telemetry::init(&settings.telemetry).context("failed to initialise logging")?;

    tracing::info!(
        environment = ?settings.environment,
        store = ?settings.store.backend,
        secrets = ?settings.secrets.provider,
        "folio bootstrap starting"
    );

    let ctx = AppContext::bootstrap(settings).await?;
    let registry = build_registry(&ctx)?;
    let init = InitCtx {
        settings: &ctx.settings,
    };

    registry.init_all(&init).await?;
    registry.start_all(&init).await?;

    let served = folio_http::start_server(&registry, &ctx.settings).await;
    registry.stop_all().await?;
    served
}
