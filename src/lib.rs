mod address;
mod config;
mod crm;
mod errors;
pub mod geocode;
mod history;
mod model;
mod summary;
mod sync;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use address::resolve_address;
pub use config::{AppConfig, PublicAppConfig};
pub use crm::{CrmGateway, SplynxClient};
pub use errors::{AppError, AppResult};
pub use geocode::{GeocodeOutcome, GeocodeProvider, GeocodingPolicy, Resolution};
pub use history::RunHistory;
pub use model::{Coordinate, CustomerRecord, GeoInfo, ResolvedAddress, ServiceRecord, ServiceStatus};
pub use summary::{FailedService, FailureReason, RunSummary, UpdatedService};
pub use sync::SyncOrchestrator;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,geo_marker_sync=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}

/// One full pass against the configured CRM and geocoding providers.
///
/// The summary is appended to the run history when one is configured; a
/// failing history write is logged and does not fail the run.
pub async fn run_sync(config: &AppConfig) -> AppResult<RunSummary> {
    info!(config = ?config.public_profile(), "starting geo marker sync");
    let crm = SplynxClient::new(config)?;
    let policy = GeocodingPolicy::from_config(config)?;
    let summary = SyncOrchestrator::new(Arc::new(crm), policy).run().await?;

    if let Some(path) = &config.history_path {
        if let Err(err) = RunHistory::open(path).and_then(|history| history.append(&summary)) {
            warn!(?err, path = %path.display(), "failed to append run history");
        }
    }
    Ok(summary)
}
