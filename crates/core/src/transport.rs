//! Registry transport.
//!
//! A [`Transport`] delivers an encoded feed to the registry and hands the acknowledgement back to
//! the gateway through a [`GatewayHandle`]. Dispatch never blocks the caller: the exchange runs on
//! its own task and reports failures to the gateway error channel.
//!
//! [`MllpTransport`] opens one MLLP connection per dispatch. The acknowledgement read from that
//! connection belongs to the request that opened it, which is how responses are correlated.

use crate::correlation::CorrelationId;
use crate::gateway::GatewayHandle;
use crate::GatewayError;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use hl7_mllp_codec::MllpCodec;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// One outbound registry exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketRequest {
    pub correlation_id: CorrelationId,
    pub label: String,
    pub host: String,
    pub port: u16,
    pub body: String,
}

/// Sends feeds to the registry.
pub trait Transport: Send + Sync + 'static {
    /// Starts the exchange for `request` and returns immediately.
    ///
    /// The response (if any) must be delivered with [`GatewayHandle::deliver_response`] under
    /// `request.correlation_id`; failures go to [`GatewayHandle::report_error`].
    fn dispatch(&self, request: SocketRequest, handle: GatewayHandle);
}

#[derive(Debug, thiserror::Error)]
enum TransportError {
    #[error("{0}")]
    Encoding(hl7::Hl7Error),
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    #[error("exchange failed: {0}")]
    Exchange(std::io::Error),
    #[error("connection closed before an acknowledgement arrived")]
    Closed,
    #[error("no acknowledgement within {0:?}")]
    TimedOut(Duration),
}

/// MLLP over TCP, one connection per dispatch.
#[derive(Clone, Debug)]
pub struct MllpTransport {
    timeout: Duration,
}

impl MllpTransport {
    /// `timeout` bounds connect, send and acknowledgement read together.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Transport for MllpTransport {
    fn dispatch(&self, request: SocketRequest, handle: GatewayHandle) {
        let timeout = self.timeout;
        tokio::spawn(async move {
            let correlation_id = request.correlation_id;
            let outcome = match tokio::time::timeout(timeout, exchange(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::TimedOut(timeout)),
            };

            match outcome {
                Ok(raw) => {
                    tracing::debug!(%correlation_id, %raw, "registry acknowledgement received");
                    if let Err(e) = handle.deliver_response(correlation_id, raw).await {
                        tracing::warn!(%correlation_id, "dropping acknowledgement: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        %correlation_id,
                        label = %request.label,
                        "registry exchange failed: {e}"
                    );
                    handle.report_error(GatewayError::Transport {
                        correlation_id,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }
}

async fn exchange(request: &SocketRequest) -> Result<String, TransportError> {
    let payload = hl7::latin1::encode(&request.body).map_err(TransportError::Encoding)?;

    let stream = TcpStream::connect((request.host.as_str(), request.port))
        .await
        .map_err(TransportError::Connect)?;
    tracing::debug!(
        correlation_id = %request.correlation_id,
        host = %request.host,
        port = request.port,
        "connected to registry"
    );

    let mut framed = Framed::new(stream, MllpCodec::new());
    framed
        .send(BytesMut::from(payload.as_slice()))
        .await
        .map_err(TransportError::Exchange)?;

    match framed.next().await {
        Some(Ok(frame)) => Ok(hl7::latin1::decode(&frame)),
        Some(Err(e)) => Err(TransportError::Exchange(e)),
        None => Err(TransportError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCommand, GatewayHandle};
    use tokio::net::TcpListener;

    const ACK: &str = "MSH|^~\\&|REG|FAC|PIX|FAC|20261019083005||ACK^A04|1|P|2.3.1\rMSA|AA|1\r";

    fn request(port: u16, body: &str) -> SocketRequest {
        SocketRequest {
            correlation_id: CorrelationId::new(),
            label: "test feed".into(),
            host: "127.0.0.1".into(),
            port,
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn delivers_the_acknowledgement_under_the_request_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let registry = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut framed = Framed::new(stream, MllpCodec::new());
            let received = framed.next().await.expect("frame").expect("decode");
            framed.send(BytesMut::from(ACK)).await.expect("send ack");
            received
        });

        let (handle, mut mailbox, _errors) = GatewayHandle::detached(4);
        let req = request(port, "MSH|^~\\&|PIX|caf\u{e9}\r");
        let id = req.correlation_id;
        MllpTransport::new(Duration::from_secs(5)).dispatch(req, handle);

        match mailbox.recv().await.expect("command") {
            GatewayCommand::Response { correlation_id, raw } => {
                assert_eq!(correlation_id, id);
                assert_eq!(raw, ACK);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let received = registry.await.expect("registry task");
        assert_eq!(&received[..], b"MSH|^~\\&|PIX|caf\xe9\r");
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let (handle, mut mailbox, mut errors) = GatewayHandle::detached(4);
        let req = request(port, "MSH|^~\\&|PIX\r");
        let id = req.correlation_id;
        MllpTransport::new(Duration::from_secs(5)).dispatch(req, handle);

        match errors.recv().await.expect("error") {
            GatewayError::Transport { correlation_id, .. } => assert_eq!(correlation_id, id),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(mailbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn registry_that_never_answers_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let registry = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let (handle, _mailbox, mut errors) = GatewayHandle::detached(4);
        MllpTransport::new(Duration::from_millis(100))
            .dispatch(request(port, "MSH|^~\\&|PIX\r"), handle);

        match errors.recv().await.expect("error") {
            GatewayError::Transport { reason, .. } => {
                assert!(reason.contains("no acknowledgement"))
            }
            other => panic!("unexpected error {other:?}"),
        }
        registry.abort();
    }

    #[tokio::test]
    async fn body_outside_latin1_is_reported_without_connecting() {
        let (handle, _mailbox, mut errors) = GatewayHandle::detached(4);
        MllpTransport::new(Duration::from_secs(1)).dispatch(request(1, "MSH|\u{20ac}"), handle);

        let err = errors.recv().await.expect("error");
        assert!(matches!(err, GatewayError::Transport { .. }));
    }
}
