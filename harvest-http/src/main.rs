use std::sync::Arc;

use harvest_core::{Catalog, Config};
use harvest_http::{serve, AppState};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_http=info,harvest_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    info!(
        mode = if config.production { "production" } else { "development" },
        backend = config.backend.name(),
        auto_seed = config.auto_seed,
        "Initializing state..."
    );

    let store = config.backend.open()?;
    let catalog = Arc::new(Catalog::new(store, config.auto_seed));
    if config.auto_seed {
        // A failed bootstrap is retried lazily by the first request that needs a table.
        if let Err(e) = catalog.bootstrap().await {
            warn!("bootstrap failed at startup: {e}");
        }
    }

    let state = AppState::new(catalog)?;
    let listener = TcpListener::bind(config.addr).await?;
    serve(listener, state).await
}
