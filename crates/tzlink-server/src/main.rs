//! tzlinkd - time zone conversion server daemon

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tzlink_server::{ConversionServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "tzlinkd", about = "Time zone conversion server", version)]
struct Args {
    /// Registry port to reuse or create
    #[arg(long, default_value_t = tzlink_core::DEFAULT_REGISTRY_PORT)]
    registry_port: u16,

    /// Host advertised to clients in the registry binding
    #[arg(long, default_value = tzlink_core::DEFAULT_HOST)]
    advertise_host: String,

    /// Service listener port (0 picks an ephemeral port)
    #[arg(long, default_value_t = 0)]
    service_port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        registry_port: args.registry_port,
        advertise_host: args.advertise_host,
        service_port: args.service_port,
        ..ServerConfig::default()
    };

    // Startup failures are fatal by design: report and exit, no retry loop
    let server = match ConversionServer::start(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve().await {
        tracing::error!("server terminated: {}", e);
        std::process::exit(1);
    }
}
