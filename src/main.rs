use anyhow::Context;
use askdocs::{
    api::{self, AppState},
    chat::QueryService,
    config, logging,
    metrics::ServiceMetrics,
    processing::IngestionService,
    qdrant::{QdrantService, VectorIndex},
};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Command-line options; environment variables cover everything else.
#[derive(Parser)]
#[command(name = "askdocs", version, about = "Document Q&A server")]
struct Cli {
    /// Override the HTTP port (takes precedence over SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let index: Arc<dyn VectorIndex> =
        Arc::new(QdrantService::new().context("Failed to initialize Qdrant client")?);
    index
        .ensure_ready(config.embedding_dimension as u64)
        .await
        .context("Failed to prepare Qdrant collection")?;

    let metrics = Arc::new(ServiceMetrics::new());
    let state = AppState {
        documents: Arc::new(IngestionService::new(
            Arc::clone(&index),
            Arc::clone(&metrics),
        )),
        query: Arc::new(QueryService::new(index, metrics)),
    };
    let app = api::create_router(state);

    let (listener, port) = bind_listener(cli.port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(override_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = override_port.or(config.server_port) {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4600..=4699;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4600-4699",
    ))
}
