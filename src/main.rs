use anyhow::Context;
use franchise_risk_lib::config::AppSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppSettings::load().context("failed to load configuration")?;
    franchise_risk_lib::init_tracing(settings.log_dir.as_deref()).map_err(anyhow::Error::msg)?;
    franchise_risk_lib::run(settings).await?;
    Ok(())
}
