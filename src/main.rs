use anyhow::Context;
use folio_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load Folio settings")?;
    folio_app::run(settings).await
}
