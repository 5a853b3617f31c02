use anyhow::Context;

use geo_marker_sync::{init_tracing, run_sync, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env();
    let summary = run_sync(&config)
        .await
        .context("geo marker sync aborted")?;
    print!("{summary}");
    Ok(())
}
