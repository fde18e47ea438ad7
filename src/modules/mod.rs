pub mod auth;
pub mod books;

use folio_kernel::ModuleRegistry;

use crate::context::AppContext;

/// Register every application module with the registry
pub fn register_all(registry: &mut ModuleRegistry, ctx: &AppContext) -> anyhow::Result<()> {
    registry.register(books::create_module(ctx))?;
    registry.register(auth::create_module(ctx))?;
    Ok(())
}
