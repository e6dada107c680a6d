use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api;
use crate::events::{parse_envelope, EnvelopeParseError, SocketEnvelope};
use crate::socket::{SocketTransport, TransportError};

const EVENT_QUEUE_CAPACITY: usize = 64;
const ACK_QUEUE_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live Socket Mode connection.
///
/// `connect` dials once inline, then hands the socket to a background pump
/// that refreshes the session whenever Slack closes it or asks for a new
/// one with a `disconnect` frame. Delivered envelopes queue on a bounded
/// channel and acknowledgements travel the other way; `connectivity`
/// exposes the link state for health reporting.
pub struct SocketModeTransport {
    api_base: String,
    app_token: SecretString,
    timeout: Duration,
    events: Mutex<Option<mpsc::Receiver<SocketEnvelope>>>,
    acks: Mutex<Option<mpsc::Sender<String>>>,
    connected: Arc<watch::Sender<bool>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SocketModeTransport {
    pub fn new(api_base: impl Into<String>, app_token: SecretString, timeout: Duration) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            api_base: api_base.into(),
            app_token,
            timeout,
            events: Mutex::new(None),
            acks: Mutex::new(None),
            connected: Arc::new(connected),
            pump: Mutex::new(None),
        }
    }

    /// Link state; `true` from the hello frame until the session drops.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

#[async_trait]
impl SocketTransport for SocketModeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        // The first dial happens inline so bad credentials fail startup
        // instead of spinning the redial loop.
        let stream = dial(&self.api_base, &self.app_token, self.timeout).await?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::channel(ACK_QUEUE_CAPACITY);
        *self.events.lock().await = Some(event_rx);
        *self.acks.lock().await = Some(ack_tx);

        let handle = tokio::spawn(pump(
            self.api_base.clone(),
            self.app_token.clone(),
            self.timeout,
            stream,
            event_tx,
            ack_rx,
            Arc::clone(&self.connected),
        ));
        if let Some(previous) = self.pump.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SocketEnvelope>, TransportError> {
        let mut guard = self.events.lock().await;
        let Some(receiver) = guard.as_mut() else {
            return Ok(None);
        };
        Ok(receiver.recv().await)
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let guard = self.acks.lock().await;
        let Some(sender) = guard.as_ref() else {
            return Err(TransportError::Acknowledge("transport is not connected".to_owned()));
        };
        sender
            .send(envelope_id.to_owned())
            .await
            .map_err(|_| TransportError::Acknowledge("socket pump has shut down".to_owned()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.acks.lock().await.take();
        // The pump may be sleeping out a redial backoff; abort rather than wait.
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        self.connected.send_replace(false);
        self.events.lock().await.take();
        Ok(())
    }
}

async fn dial(
    api_base: &str,
    app_token: &SecretString,
    timeout: Duration,
) -> Result<WsStream, TransportError> {
    let socket_url = api::open_socket_url(api_base, app_token, timeout)
        .await
        .map_err(|error| TransportError::Connect(error.to_string()))?;
    let (stream, _response) = connect_async(socket_url.as_str())
        .await
        .map_err(|error| TransportError::Connect(error.to_string()))?;
    Ok(stream)
}

/// Keeps a session alive for the life of the transport, redialing after
/// every close. Exits when the consuming side of the event queue is gone.
async fn pump(
    api_base: String,
    app_token: SecretString,
    timeout: Duration,
    mut stream: WsStream,
    events: mpsc::Sender<SocketEnvelope>,
    mut acks: mpsc::Receiver<String>,
    connected: Arc<watch::Sender<bool>>,
) {
    loop {
        let (mut sink, mut source) = stream.split();
        let reason = drive(&mut sink, &mut source, &events, &mut acks, &connected).await;
        connected.send_replace(false);

        match reason {
            CloseReason::Dropped => return,
            CloseReason::Refresh => info!("socket session refresh requested; reconnecting"),
            CloseReason::Closed => info!("socket stream closed by peer; reconnecting"),
            CloseReason::Failed => warn!("socket session failed; reconnecting"),
        }

        stream = loop {
            tokio::time::sleep(RECONNECT_DELAY).await;
            if events.is_closed() {
                return;
            }
            match dial(&api_base, &app_token, timeout).await {
                Ok(next) => break next,
                Err(error) => warn!(error = %error, "socket redial failed; trying again"),
            }
        };
    }
}

enum CloseReason {
    /// Transport handle dropped; the pump is done for good.
    Dropped,
    /// Server asked for a fresh session with a disconnect frame.
    Refresh,
    /// Stream ended without a refresh request.
    Closed,
    /// Read or write error tore the session down.
    Failed,
}

async fn drive<Si, St>(
    sink: &mut Si,
    source: &mut St,
    events: &mpsc::Sender<SocketEnvelope>,
    acks: &mut mpsc::Receiver<String>,
    connected: &watch::Sender<bool>,
) -> CloseReason
where
    Si: Sink<Message, Error = WsError> + Unpin,
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            maybe_ack = acks.recv() => {
                let Some(envelope_id) = maybe_ack else {
                    return CloseReason::Dropped;
                };
                if let Err(error) = sink.send(Message::text(ack_frame(&envelope_id))).await {
                    warn!(envelope_id = %envelope_id, error = %error, "socket ack write failed");
                    return CloseReason::Failed;
                }
                debug!(envelope_id = %envelope_id, "socket envelope acknowledged on the wire");
            }
            maybe_frame = source.next() => {
                let Some(frame) = maybe_frame else {
                    return CloseReason::Closed;
                };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(error) => {
                        warn!(error = %error, "socket read failed");
                        return CloseReason::Failed;
                    }
                };
                let action = match &frame {
                    Message::Text(text) => classify_frame(text.as_str()),
                    Message::Binary(bytes) => match std::str::from_utf8(bytes) {
                        Ok(text) => classify_frame(text),
                        Err(error) => {
                            warn!(error = %error, "binary socket frame is not utf-8; skipping");
                            continue;
                        }
                    },
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                    Message::Close(_) => {
                        debug!("close frame received");
                        continue;
                    }
                };
                match action {
                    Ok(FrameAction::Hello) => {
                        info!("socket mode session is open");
                        connected.send_replace(true);
                    }
                    Ok(FrameAction::Refresh) => return CloseReason::Refresh,
                    Ok(FrameAction::Deliver(envelope)) => {
                        if events.send(envelope).await.is_err() {
                            return CloseReason::Dropped;
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "undecodable socket frame; skipping");
                    }
                }
            }
        }
    }
}

/// What a websocket frame means for the session.
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    /// Session accepted; event envelopes follow.
    Hello,
    /// Slack is about to close the socket and wants a fresh dial.
    Refresh,
    Deliver(SocketEnvelope),
}

#[derive(Debug, Deserialize)]
struct FramePeek {
    #[serde(rename = "type", default)]
    frame_type: String,
}

/// Splits control frames from envelope deliveries; `hello` and
/// `disconnect` never leave the transport.
fn classify_frame(raw: &str) -> Result<FrameAction, EnvelopeParseError> {
    let peek: FramePeek = serde_json::from_str(raw)?;
    match peek.frame_type.as_str() {
        "hello" => Ok(FrameAction::Hello),
        "disconnect" => Ok(FrameAction::Refresh),
        _ => Ok(FrameAction::Deliver(parse_envelope(raw)?)),
    }
}

fn ack_frame(envelope_id: &str) -> String {
    json!({ "envelope_id": envelope_id }).to_string()
}
