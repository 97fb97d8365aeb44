//! Registry service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tzlink_core::{Endpoint, TzError, TzResult};
use tzlink_transport::MessageStream;
use tzlink_wire::Message;

/// In-memory name -> endpoint table.
#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: RwLock<HashMap<String, Endpoint>>,
}

impl BindingTable {
    pub fn new() -> Self {
        BindingTable::default()
    }

    /// Bind or replace. Replacement is what makes server restarts safe.
    pub fn rebind(&self, name: impl Into<String>, endpoint: Endpoint) {
        let name = name.into();
        let replaced = self
            .bindings
            .write()
            .insert(name.clone(), endpoint)
            .is_some();
        tracing::info!(%name, replaced, "rebind");
    }

    pub fn lookup(&self, name: &str) -> Option<Endpoint> {
        self.bindings.read().get(name).cloned()
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// A running registry: binding table plus accept loop.
///
/// Dropping the registry aborts the accept loop and releases the port.
pub struct Registry {
    table: Arc<BindingTable>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl Registry {
    /// Bind the registry listener on the given port and start serving.
    /// Port 0 picks an ephemeral port (tests).
    pub async fn bind(port: u16) -> TzResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| TzError::Startup(format!("registry bind on port {}: {}", port, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TzError::Startup(format!("registry local addr: {}", e)))?;

        let table = Arc::new(BindingTable::new());
        let accept_table = Arc::clone(&table);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let table = Arc::clone(&accept_table);
                        tokio::spawn(async move {
                            let mut stream = MessageStream::from_stream(stream);
                            if let Err(e) = serve_connection(&table, &mut stream).await {
                                tracing::debug!(peer = %addr, "registry connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!("registry accept error: {}", e);
                    }
                }
            }
        });

        tracing::info!(%local_addr, "registry listening");
        Ok(Registry {
            table,
            local_addr,
            accept_task,
        })
    }

    pub fn table(&self) -> Arc<BindingTable> {
        Arc::clone(&self.table)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(table: &BindingTable, stream: &mut MessageStream) -> TzResult<()> {
    while let Some(message) = stream.recv_or_eof().await? {
        let reply = match message {
            Message::LookupRequest { name } => match table.lookup(&name) {
                Some(endpoint) => Message::LookupReply { endpoint },
                None => Message::fault(&TzError::NotBound(name)),
            },
            Message::RebindRequest { name, endpoint } => {
                table.rebind(name, endpoint);
                Message::RebindReply
            }
            Message::ListRequest => Message::ListReply {
                names: table.names(),
            },
            other => Message::fault(&TzError::Remote(format!(
                "registry cannot serve message tag {:#04x}",
                other.tag()
            ))),
        };
        stream.send(&reply).await?;
    }
    Ok(())
}
