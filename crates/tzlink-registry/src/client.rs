//! Client-side registry operations

use std::time::Duration;

use tzlink_core::{Endpoint, TzError, TzResult};
use tzlink_transport::MessageStream;
use tzlink_wire::{error_from_fault, Message};

/// Look up `name` at the registry, returning the bound service endpoint.
pub async fn lookup(registry: &Endpoint, name: &str, timeout: Duration) -> TzResult<Endpoint> {
    let mut stream = MessageStream::connect(registry, timeout).await?;
    match stream
        .call(&Message::LookupRequest { name: name.into() }, timeout)
        .await?
    {
        Message::LookupReply { endpoint } => Ok(endpoint),
        Message::Fault { kind, message } => Err(error_from_fault(kind, message)),
        other => Err(TzError::InvalidWireFormat(format!(
            "unexpected lookup reply tag {:#04x}",
            other.tag()
        ))),
    }
}

/// Bind or replace `name -> service` at the registry.
pub async fn rebind(
    registry: &Endpoint,
    name: &str,
    service: Endpoint,
    timeout: Duration,
) -> TzResult<()> {
    let mut stream = MessageStream::connect(registry, timeout).await?;
    match stream
        .call(
            &Message::RebindRequest {
                name: name.into(),
                endpoint: service,
            },
            timeout,
        )
        .await?
    {
        Message::RebindReply => Ok(()),
        Message::Fault { kind, message } => Err(error_from_fault(kind, message)),
        other => Err(TzError::InvalidWireFormat(format!(
            "unexpected rebind reply tag {:#04x}",
            other.tag()
        ))),
    }
}

/// Whether something that speaks the registry protocol answers at the
/// endpoint. One List round trip; used by the server's reuse-or-create
/// startup step.
pub async fn probe(registry: &Endpoint, timeout: Duration) -> bool {
    match MessageStream::connect(registry, timeout).await {
        Ok(mut stream) => matches!(
            stream.call(&Message::ListRequest, timeout).await,
            Ok(Message::ListReply { .. })
        ),
        Err(_) => false,
    }
}
