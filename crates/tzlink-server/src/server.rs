//! Service export and serve loop

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use tzlink_convert::TimeConversionService;
use tzlink_core::{Endpoint, TzError, TzResult, DEFAULT_HOST, DEFAULT_REGISTRY_PORT, SERVICE_NAME};
use tzlink_registry::{probe, rebind, Registry};
use tzlink_transport::{MessageStream, DEFAULT_IO_TIMEOUT};
use tzlink_wire::Message;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Registry port to reuse or create
    pub registry_port: u16,
    /// Name the service binds under
    pub service_name: String,
    /// Host advertised to clients in the registry binding
    pub advertise_host: String,
    /// Service listener port (0 picks an ephemeral port)
    pub service_port: u16,
    /// Timeout for registry operations at startup
    pub io_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            registry_port: DEFAULT_REGISTRY_PORT,
            service_name: SERVICE_NAME.to_string(),
            advertise_host: DEFAULT_HOST.to_string(),
            service_port: 0,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// A started conversion server: listener bound, name registered.
pub struct ConversionServer {
    service: TimeConversionService,
    listener: TcpListener,
    local_addr: SocketAddr,
    registry_port: u16,
    /// Present when this server created the registry; keeps it alive for
    /// the lifetime of the serve loop.
    registry: Option<Registry>,
}

impl ConversionServer {
    /// Execute the startup contract:
    ///
    /// 1. Bind the service listener.
    /// 2. Probe the registry port; reuse a listening registry, else create
    ///    one in-process.
    /// 3. Rebind the well-known name (replace semantics, restart-safe).
    ///
    /// Any failure is a fatal `Startup` error; there is no retry loop at
    /// this layer.
    pub async fn start(config: &ServerConfig) -> TzResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.service_port))
            .await
            .map_err(|e| {
                TzError::Startup(format!(
                    "service bind on port {}: {}",
                    config.service_port, e
                ))
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TzError::Startup(format!("service local addr: {}", e)))?;

        let probe_endpoint = Endpoint::new(DEFAULT_HOST, config.registry_port);
        let (registry, registry_port) = if probe(&probe_endpoint, config.io_timeout).await {
            tracing::info!(
                port = config.registry_port,
                "found existing registry, reusing it"
            );
            (None, config.registry_port)
        } else {
            let owned = Registry::bind(config.registry_port).await?;
            let port = owned.port();
            tracing::info!(port, "created new registry");
            (Some(owned), port)
        };

        let registry_endpoint = Endpoint::new(DEFAULT_HOST, registry_port);
        let service_endpoint = Endpoint::new(config.advertise_host.clone(), local_addr.port());
        rebind(
            &registry_endpoint,
            &config.service_name,
            service_endpoint,
            config.io_timeout,
        )
        .await
        .map_err(|e| TzError::Startup(format!("binding {}: {}", config.service_name, e)))?;

        tracing::info!(name = %config.service_name, %local_addr, "conversion server ready");
        Ok(ConversionServer {
            service: TimeConversionService::new(),
            listener,
            local_addr,
            registry_port,
            registry,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Port of the registry this server registered with.
    pub fn registry_port(&self) -> u16 {
        self.registry_port
    }

    pub fn owns_registry(&self) -> bool {
        self.registry.is_some()
    }

    /// Serve forever. Each accepted connection runs on its own task; the
    /// service is stateless, so concurrent calls need no locking.
    pub async fn serve(self) -> TzResult<()> {
        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| TzError::Transport(format!("accept: {}", e)))?;
            let service = self.service;
            tokio::spawn(async move {
                let mut stream = MessageStream::from_stream(stream);
                if let Err(e) = serve_connection(&service, &mut stream).await {
                    tracing::debug!(peer = %addr, "connection ended: {}", e);
                }
            });
        }
    }
}

/// Answer calls on one connection until the peer hangs up. Business
/// failures go back as typed faults; they never tear the connection down.
async fn serve_connection(
    service: &TimeConversionService,
    stream: &mut MessageStream,
) -> TzResult<()> {
    while let Some(message) = stream.recv_or_eof().await? {
        let reply = match message {
            Message::ConvertRequest {
                timestamp,
                from_zone,
                to_zone,
            } => match service.convert_strings(&timestamp, &from_zone, &to_zone) {
                Ok(converted) => Message::ConvertReply {
                    timestamp: converted,
                },
                Err(e) => {
                    tracing::debug!("conversion failed: {}", e);
                    Message::fault(&e)
                }
            },
            other => Message::fault(&TzError::Remote(format!(
                "service cannot serve message tag {:#04x}",
                other.tag()
            ))),
        };
        stream.send(&reply).await?;
    }
    Ok(())
}
