//! Connection state machine and remote converter

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tzlink_convert::TimeConversion;
use tzlink_core::{
    CivilTimestamp, ConversionRequest, ConversionResult, Endpoint, TzError, TzResult,
    DEFAULT_HOST, SERVICE_NAME,
};
use tzlink_registry::lookup;
use tzlink_transport::{MessageStream, DEFAULT_IO_TIMEOUT};
use tzlink_wire::{error_from_fault, Message};

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Name to look up in the registry
    pub service_name: String,
    /// Timeout for registry lookups and service connects
    pub lookup_timeout: Duration,
    /// Timeout for one conversion round trip
    pub call_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            service_name: SERVICE_NAME.to_string(),
            lookup_timeout: DEFAULT_IO_TIMEOUT,
            call_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Externally visible connection status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// A live link to the conversion service
struct ServiceLink {
    /// Registry endpoint the service was discovered through; reconnects
    /// repeat the lookup there
    registry: Endpoint,
    stream: MessageStream,
}

enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(ServiceLink),
    Reconnecting,
}

impl ConnectionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
            ConnectionState::Reconnecting => ConnectionStatus::Reconnecting,
        }
    }
}

/// Client for the remote conversion service.
///
/// The connection state is owned exclusively by this instance and every
/// transition runs inside one mutex section, so overlapping calls
/// serialize instead of corrupting the state.
pub struct ConverterClient {
    config: ClientConfig,
    state: Mutex<ConnectionState>,
}

impl ConverterClient {
    pub fn new(config: ClientConfig) -> Self {
        ConverterClient {
            config,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.lock().await.status()
    }

    /// Whether conversion requests can be issued right now.
    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected(_))
    }

    /// Look the service up at `host:port` and cache the link.
    ///
    /// A failed attempt against `localhost` is retried once with the
    /// loopback literal; some environments resolve the two differently.
    /// On failure the client stays Disconnected and the error surfaces.
    pub async fn connect(&self, host: &str, port: u16) -> TzResult<()> {
        let mut state = self.state.lock().await;
        *state = ConnectionState::Connecting;

        let link = match self.open_link(host, port).await {
            Ok(link) => Ok(link),
            Err(e) if host == "localhost" => {
                tracing::debug!(
                    "lookup via localhost failed ({}), retrying with {}",
                    e,
                    DEFAULT_HOST
                );
                self.open_link(DEFAULT_HOST, port).await
            }
            Err(e) => Err(e),
        };

        match link {
            Ok(link) => {
                tracing::info!(registry = %link.registry, "connected");
                *state = ConnectionState::Connected(link);
                Ok(())
            }
            Err(e) => {
                *state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Drop the cached link unconditionally. The server-side binding is
    /// left alone; the server is independently owned.
    pub async fn disconnect(&self) {
        *self.state.lock().await = ConnectionState::Disconnected;
        tracing::info!("disconnected");
    }

    /// Issue one conversion over the cached link.
    ///
    /// A connection-class failure triggers exactly one fresh lookup at the
    /// last-known registry endpoint and one replay of this request. The
    /// replay's outcome is final: a business error surfaces with the new
    /// link kept, a second connection failure drops to Disconnected.
    pub async fn issue(&self, request: &ConversionRequest) -> TzResult<ConversionResult> {
        let mut state = self.state.lock().await;
        // All transitions happen under the lock, so the state here is
        // either Disconnected or Connected, never a transient
        let ConnectionState::Connected(mut link) =
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        else {
            return Err(TzError::NotConnected);
        };
        let registry = link.registry.clone();

        match call_convert(&mut link.stream, request, self.config.call_timeout).await {
            Ok(result) => {
                *state = ConnectionState::Connected(link);
                Ok(result)
            }
            Err(e) if e.is_connection_class() => {
                tracing::warn!("connection failure ({}), attempting one reconnect", e);
                *state = ConnectionState::Reconnecting;
                match self.open_link(&registry.host, registry.port).await {
                    Ok(mut link) => {
                        let replayed =
                            call_convert(&mut link.stream, request, self.config.call_timeout)
                                .await;
                        match replayed {
                            Ok(result) => {
                                tracing::info!("reconnected, request replayed");
                                *state = ConnectionState::Connected(link);
                                Ok(result)
                            }
                            Err(e) if e.is_connection_class() => {
                                *state = ConnectionState::Disconnected;
                                Err(e)
                            }
                            Err(business) => {
                                // Fresh link is good; the request itself
                                // failed. Keep the connection.
                                *state = ConnectionState::Connected(link);
                                Err(business)
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("reconnect failed: {}", e);
                        *state = ConnectionState::Disconnected;
                        Err(e)
                    }
                }
            }
            Err(business) => {
                *state = ConnectionState::Connected(link);
                Err(business)
            }
        }
    }

    async fn open_link(&self, host: &str, port: u16) -> TzResult<ServiceLink> {
        let registry = Endpoint::new(host, port);
        let service = lookup(&registry, &self.config.service_name, self.config.lookup_timeout)
            .await?;
        let stream = MessageStream::connect(&service, self.config.lookup_timeout).await?;
        Ok(ServiceLink { registry, stream })
    }
}

#[async_trait]
impl TimeConversion for ConverterClient {
    async fn convert(&self, request: &ConversionRequest) -> TzResult<ConversionResult> {
        self.issue(request).await
    }
}

async fn call_convert(
    stream: &mut MessageStream,
    request: &ConversionRequest,
    timeout: Duration,
) -> TzResult<ConversionResult> {
    let message = Message::ConvertRequest {
        timestamp: request.timestamp.to_string(),
        from_zone: request.from_zone.as_str().to_string(),
        to_zone: request.to_zone.as_str().to_string(),
    };
    match stream.call(&message, timeout).await? {
        Message::ConvertReply { timestamp } => {
            Ok(ConversionResult::new(CivilTimestamp::parse(&timestamp)?))
        }
        Message::Fault { kind, message } => Err(error_from_fault(kind, message)),
        other => Err(TzError::InvalidWireFormat(format!(
            "unexpected convert reply tag {:#04x}",
            other.tag()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tzlink_core::ZoneId;
    use tzlink_registry::{rebind, Registry};
    use tzlink_server::{ConversionServer, ServerConfig};

    fn request(time: &str, from: &str, to: &str) -> ConversionRequest {
        ConversionRequest::new(
            CivilTimestamp::parse(time).unwrap(),
            ZoneId::new(from).unwrap(),
            ZoneId::new(to).unwrap(),
        )
    }

    async fn start_server(registry_port: u16) -> ConversionServer {
        ConversionServer::start(&ServerConfig {
            registry_port,
            service_port: 0,
            ..ServerConfig::default()
        })
        .await
        .unwrap()
    }

    /// A service endpoint that accepts connections and immediately drops
    /// them: connects succeed, the first call on the link dies.
    async fn flaky_service() -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => drop(stream),
                    Err(_) => break,
                }
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_connect_issue_disconnect() {
        let server = start_server(0).await;
        let registry_port = server.registry_port();
        tokio::spawn(server.serve());

        let client = ConverterClient::new(ClientConfig::default());
        assert!(!client.is_ready().await);
        assert_eq!(client.status().await, ConnectionStatus::Disconnected);

        client.connect("127.0.0.1", registry_port).await.unwrap();
        assert!(client.is_ready().await);

        let result = client
            .issue(&request(
                "2023-01-01 00:00:00",
                "America/Anchorage",
                "Pacific/Honolulu",
            ))
            .await
            .unwrap();
        assert_eq!(result.timestamp.to_string(), "2022-12-31 23:00:00");

        client.disconnect().await;
        assert!(!client.is_ready().await);
        assert!(matches!(
            client.issue(&request("2023-01-01 00:00:00", "UTC", "UTC")).await,
            Err(TzError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        // Grab a dead port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = ConverterClient::new(ClientConfig::default());
        let err = client.connect("127.0.0.1", port).await.unwrap_err();
        assert!(err.is_connection_class());
        assert_eq!(client.status().await, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_localhost_falls_back_to_loopback() {
        // Both attempts hit a dead port; the fallback must still end in a
        // clean Disconnected state with the error surfaced
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = ConverterClient::new(ClientConfig::default());
        let err = client.connect("localhost", port).await.unwrap_err();
        assert!(err.is_connection_class());
        assert!(!client.is_ready().await);
    }

    #[tokio::test]
    async fn test_business_error_does_not_reconnect() {
        let server = start_server(0).await;
        let registry_port = server.registry_port();
        tokio::spawn(server.serve());

        let client = ConverterClient::new(ClientConfig::default());
        client.connect("127.0.0.1", registry_port).await.unwrap();

        let err = client
            .issue(&request("2023-01-01 00:00:00", "Mars/Crater", "UTC"))
            .await
            .unwrap_err();
        assert!(matches!(err, TzError::UnknownZone(_)));

        // The link is untouched and still works
        assert_eq!(client.status().await, ConnectionStatus::Connected);
        let result = client
            .issue(&request("2023-06-15 23:30:00", "UTC", "Asia/Tokyo"))
            .await
            .unwrap();
        assert_eq!(result.timestamp.to_string(), "2023-06-16 08:30:00");
    }

    #[tokio::test]
    async fn test_reconnect_replays_request_once() {
        let registry = Registry::bind(0).await.unwrap();
        let registry_endpoint = Endpoint::new("127.0.0.1", registry.port());

        // Bind the name to a service that kills every connection
        let (flaky_port, flaky) = flaky_service().await;
        rebind(
            &registry_endpoint,
            SERVICE_NAME,
            Endpoint::new("127.0.0.1", flaky_port),
            DEFAULT_IO_TIMEOUT,
        )
        .await
        .unwrap();

        let client = ConverterClient::new(ClientConfig::default());
        client.connect("127.0.0.1", registry.port()).await.unwrap();

        // A healthy server takes over the binding before the retry
        let server = start_server(registry.port()).await;
        tokio::spawn(server.serve());
        flaky.abort();

        // The caller issues once; the client reconnects and replays
        let result = client
            .issue(&request(
                "2023-01-01 00:00:00",
                "America/Anchorage",
                "Pacific/Honolulu",
            ))
            .await
            .unwrap();
        assert_eq!(result.timestamp.to_string(), "2022-12-31 23:00:00");
        assert_eq!(client.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_replay_business_error_keeps_fresh_link() {
        let registry = Registry::bind(0).await.unwrap();
        let registry_endpoint = Endpoint::new("127.0.0.1", registry.port());

        let (flaky_port, flaky) = flaky_service().await;
        rebind(
            &registry_endpoint,
            SERVICE_NAME,
            Endpoint::new("127.0.0.1", flaky_port),
            DEFAULT_IO_TIMEOUT,
        )
        .await
        .unwrap();

        let client = ConverterClient::new(ClientConfig::default());
        client.connect("127.0.0.1", registry.port()).await.unwrap();

        let server = start_server(registry.port()).await;
        tokio::spawn(server.serve());
        flaky.abort();

        // First attempt dies on the flaky link, the replay reaches the
        // healthy server and fails as business - no second reconnect
        let err = client
            .issue(&request("2023-01-01 00:00:00", "Mars/Crater", "UTC"))
            .await
            .unwrap_err();
        assert!(matches!(err, TzError::UnknownZone(_)));
        assert_eq!(client.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_failure_falls_back_to_disconnected() {
        let registry = Registry::bind(0).await.unwrap();
        let registry_endpoint = Endpoint::new("127.0.0.1", registry.port());
        let registry_port = registry.port();

        let (flaky_port, flaky) = flaky_service().await;
        rebind(
            &registry_endpoint,
            SERVICE_NAME,
            Endpoint::new("127.0.0.1", flaky_port),
            DEFAULT_IO_TIMEOUT,
        )
        .await
        .unwrap();

        let client = ConverterClient::new(ClientConfig {
            lookup_timeout: Duration::from_millis(500),
            call_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        });
        client.connect("127.0.0.1", registry_port).await.unwrap();

        // Everything goes away before the next call
        drop(registry);
        flaky.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = client
            .issue(&request("2023-01-01 00:00:00", "UTC", "UTC"))
            .await
            .unwrap_err();
        // The surfaced error names the connection failure, not a business
        // fault, and the client requires a fresh connect
        assert!(err.is_connection_class());
        assert_eq!(client.status().await, ConnectionStatus::Disconnected);
        assert!(!client.is_ready().await);
    }
}
