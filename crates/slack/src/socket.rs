use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::attachment::OutboundReply;
use crate::events::{
    default_dispatcher, DispatchError, EventContext, EventDispatcher, HandlerResult,
    SocketEnvelope,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Source of delivered socket envelopes.
///
/// Implementations own the connection lifecycle, reconnection included;
/// `next_envelope` returning `Ok(None)` means the transport has shut down
/// for good.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SocketEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SocketEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("reply delivery failed: {0}")]
pub struct ReplyDeliveryError(pub String);

/// Outbound half of the loop; posts one reply to its channel.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn post_reply(&self, reply: &OutboundReply) -> Result<(), ReplyDeliveryError>;
}

#[derive(Default)]
pub struct NoopReplySink;

#[async_trait]
impl ReplySink for NoopReplySink {
    async fn post_reply(&self, _reply: &OutboundReply) -> Result<(), ReplyDeliveryError> {
        Ok(())
    }
}

/// Single-consumer event loop: wait, acknowledge, dispatch, reply.
///
/// Envelopes are acknowledged on dequeue, before their handler runs. Every
/// per-event failure is logged and skipped; the loop ends only when the
/// transport closes or the shutdown signal flips, checked between
/// deliveries.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    sink: Arc<dyn ReplySink>,
    shutdown: watch::Receiver<bool>,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self {
            transport: Arc::new(NoopSocketTransport),
            dispatcher: default_dispatcher(),
            sink: Arc::new(NoopReplySink),
            shutdown: receiver,
        }
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        sink: Arc<dyn ReplySink>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { transport, dispatcher, sink, shutdown }
    }

    pub async fn start(&self) -> Result<(), SocketError> {
        info!("opening socket mode transport connection");
        self.transport.connect().await?;
        info!("socket mode transport connected");

        loop {
            if *self.shutdown.borrow() {
                info!("shutdown observed; leaving socket loop");
                break;
            }

            match self.transport.next_envelope().await {
                Ok(Some(envelope)) => self.process(envelope).await,
                Ok(None) => {
                    info!("socket mode transport stream closed");
                    break;
                }
                Err(error) => {
                    warn!(error = %error, "transport receive failed; continuing socket loop");
                }
            }
        }

        if let Err(error) = self.transport.disconnect().await {
            warn!(error = %error, "transport disconnect failed");
        }
        Ok(())
    }

    async fn process(&self, envelope: SocketEnvelope) {
        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_kind = ?envelope.event.kind(),
            correlation_id = %envelope.envelope_id,
            "received slack envelope"
        );

        // Acknowledge before dispatch; an unacknowledged envelope is
        // redelivered by Slack.
        if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
            warn!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "failed to acknowledge slack envelope"
            );
        } else {
            debug!(
                event_name = "ingress.slack.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                "acknowledged slack envelope"
            );
        }

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(HandlerResult::Replied(reply)) => self.deliver(&envelope.envelope_id, reply).await,
            Ok(HandlerResult::Handled | HandlerResult::Ignored) => {}
            Err(DispatchError::UnsupportedEnvelope { envelope_type }) => {
                warn!(
                    event_name = "ingress.slack.unsupported_envelope",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    envelope_type = %envelope_type,
                    "unsupported envelope category; skipping"
                );
            }
            Err(error) => {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
            }
        }
    }

    async fn deliver(&self, envelope_id: &str, reply: OutboundReply) {
        if let Err(error) = self.sink.post_reply(&reply).await {
            warn!(
                event_name = "egress.slack.reply_failed",
                envelope_id = %envelope_id,
                correlation_id = %envelope_id,
                channel = %reply.channel,
                error = %error,
                "reply delivery failed; continuing socket loop"
            );
        } else {
            debug!(
                event_name = "egress.slack.reply_posted",
                envelope_id = %envelope_id,
                correlation_id = %envelope_id,
                channel = %reply.channel,
                "posted reply"
            );
        }
    }
}
