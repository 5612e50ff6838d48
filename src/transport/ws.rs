//! Production WebSocket transport.
//!
//! Each connection runs the service dialogue on its own thread: the
//! upgrade request carries the credential and a generated `X-ConnectionId`,
//! then a biased select loop forwards outbound frames and dispatches parsed
//! inbound frames to the observer. The adapter side stays synchronous;
//! outbound calls only enqueue onto the connection's channel.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AdapterError, TransportError};

use super::endpoint::ClientConfig;
use super::messages::UspMessage;
use super::{dispatch, UspConnection, UspConnector, UspObserver};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector producing [`WsConnection`] handles.
#[derive(Debug, Default)]
pub struct WsConnector;

impl UspConnector for WsConnector {
    fn connect(
        &self,
        config: &ClientConfig,
        observer: Weak<dyn UspObserver>,
    ) -> Result<Arc<dyn UspConnection>, AdapterError> {
        let connection = WsConnection::open(config, observer)?;
        Ok(Arc::new(connection))
    }
}

enum Outbound {
    Message { path: String, body: Vec<u8> },
    Audio(Bytes),
    Flush,
}

/// A live WebSocket connection.
///
/// Dropping the handle signals shutdown and joins the connection thread,
/// except when the drop happens on that thread itself (an observer
/// callback tearing the connection down mid-dispatch).
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
}

impl WsConnection {
    fn open(
        config: &ClientConfig,
        observer: Weak<dyn UspObserver>,
    ) -> Result<Self, AdapterError> {
        let url = config.connection_url()?;
        let authentication = config.authentication.clone();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), TransportError>>();

        let worker = thread::Builder::new()
            .name("usp-ws".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(TransportError::ConnectionFailed(format!(
                            "failed to start connection runtime: {e}"
                        ))));
                        return;
                    }
                };
                runtime.block_on(run_connection(
                    url,
                    authentication,
                    observer,
                    outbound_rx,
                    shutdown_rx,
                    ready_tx,
                ));
            })
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("failed to spawn connection thread: {e}"))
            })?;

        let worker_thread = worker.thread().id();

        match ready_rx.recv_timeout(CONNECT_TIMEOUT + Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                outbound: outbound_tx,
                shutdown: Mutex::new(Some(shutdown_tx)),
                worker: Mutex::new(Some(worker)),
                worker_thread,
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::ConnectionFailed(
                "timed out waiting for the connection handshake".to_string(),
            )
            .into()),
        }
    }

    fn enqueue(&self, frame: Outbound) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl UspConnection for WsConnection {
    fn send_message(&self, path: &str, body: &[u8]) -> Result<(), TransportError> {
        self.enqueue(Outbound::Message {
            path: path.to_string(),
            body: body.to_vec(),
        })
    }

    fn write_audio(&self, data: &[u8]) -> Result<(), TransportError> {
        self.enqueue(Outbound::Audio(Bytes::copy_from_slice(data)))
    }

    fn flush_audio(&self) -> Result<(), TransportError> {
        self.enqueue(Outbound::Flush)
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.lock().take() {
            // joining our own thread would deadlock; the loop is already
            // unwinding when the handle is dropped from a callback
            if thread::current().id() != self.worker_thread {
                let _ = worker.join();
            }
        }
    }
}

/// Frame an outbound text message: headers, blank line, JSON body.
fn text_frame(path: &str, body: &[u8]) -> String {
    format!(
        "Path:{}\r\nX-RequestId:{}\r\nContent-Type:application/json\r\n\r\n{}",
        path,
        Uuid::new_v4().simple(),
        String::from_utf8_lossy(body),
    )
}

/// Frame an outbound audio chunk: u16 header length, headers, payload.
fn audio_frame(request_id: &str, payload: &[u8]) -> Vec<u8> {
    let headers = format!(
        "Path:audio\r\nX-RequestId:{request_id}\r\nContent-Type:audio/x-wav\r\n"
    );
    let mut frame = Vec::with_capacity(2 + headers.len() + payload.len());
    frame.extend_from_slice(&(headers.len() as u16).to_be_bytes());
    frame.extend_from_slice(headers.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn notify_error(observer: &Weak<dyn UspObserver>, message: String) {
    if let Some(observer) = observer.upgrade() {
        observer.on_error(message);
    }
}

async fn run_connection(
    url: url::Url,
    authentication: super::endpoint::Authentication,
    observer: Weak<dyn UspObserver>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut shutdown: oneshot::Receiver<()>,
    ready: std::sync::mpsc::Sender<Result<(), TransportError>>,
) {
    let host = url.host_str().unwrap_or_default().to_string();
    let connection_id = Uuid::new_v4().simple().to_string();
    let (auth_header, auth_value) = authentication.header();

    let request = match Request::builder()
        .method("GET")
        .uri(url.as_str())
        .header("Host", &host)
        .header("Upgrade", "websocket")
        .header("Connection", "upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13")
        .header(auth_header, &auth_value)
        .header("X-ConnectionId", &connection_id)
        .body(())
    {
        Ok(request) => request,
        Err(e) => {
            let _ = ready.send(Err(TransportError::ConnectionFailed(format!(
                "failed to build upgrade request: {e}"
            ))));
            return;
        }
    };

    let connect_result = match timeout(CONNECT_TIMEOUT, connect_async(request)).await {
        Ok(result) => result,
        Err(_) => {
            let _ = ready.send(Err(TransportError::ConnectionFailed(format!(
                "connection to {host} timed out"
            ))));
            return;
        }
    };

    let (ws_stream, _response) = match connect_result {
        Ok(result) => result,
        Err(e) => {
            let message = format!("failed to connect to {host}: {e}");
            let error = if message.contains("401") || message.contains("Unauthorized") {
                TransportError::AuthenticationFailed(message)
            } else {
                TransportError::ConnectionFailed(message)
            };
            let _ = ready.send(Err(error));
            return;
        }
    };

    info!("connected to {host} (connection_id: {connection_id})");
    let _ = ready.send(Ok(()));

    let (mut sink, mut stream) = ws_stream.split();
    let audio_request_id = Uuid::new_v4().simple().to_string();

    loop {
        tokio::select! {
            // outbound first: audio latency matters more than inbound dispatch
            biased;

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let message = match frame {
                    Outbound::Message { path, body } => Message::text(text_frame(&path, &body)),
                    Outbound::Audio(data) => Message::binary(audio_frame(&audio_request_id, &data)),
                    Outbound::Flush => Message::binary(audio_frame(&audio_request_id, &[])),
                };
                if let Err(e) = sink.send(message).await {
                    notify_error(&observer, format!("failed to send to service: {e}"));
                    break;
                }
            }

            message = stream.next() => {
                match message {
                    Some(Ok(frame)) => {
                        if !dispatch_frame(&observer, frame) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        notify_error(&observer, format!("websocket error: {e}"));
                        break;
                    }
                    None => {
                        notify_error(&observer, "connection closed by service".to_string());
                        break;
                    }
                }
            }

            _ = &mut shutdown => {
                debug!("connection shutdown requested");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("connection to {host} closed");
}

/// Parse and dispatch one inbound frame. Returns false when the observer
/// is gone and the loop should stop.
fn dispatch_frame(observer: &Weak<dyn UspObserver>, frame: Message) -> bool {
    let Some(observer) = observer.upgrade() else {
        debug!("observer dropped; stopping connection loop");
        return false;
    };

    match frame {
        Message::Text(text) => match UspMessage::parse_text(text.as_str()) {
            Ok(message) => dispatch(observer.as_ref(), message),
            Err(e) => warn!("unparseable text frame: {e}"),
        },
        Message::Binary(data) => match UspMessage::parse_binary(&data) {
            Ok(message) => dispatch(observer.as_ref(), message),
            Err(e) => warn!("unparseable binary frame: {e}"),
        },
        Message::Close(frame) => {
            info!("service sent close: {frame:?}");
        }
        Message::Ping(_) | Message::Pong(_) => {}
        _ => debug!("ignoring unexpected frame type"),
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_layout() {
        let frame = text_frame("speech.context", br#"{"dgi":{}}"#);
        let (headers, body) = frame.split_once("\r\n\r\n").unwrap();

        assert!(headers.starts_with("Path:speech.context\r\n"));
        assert!(headers.contains("X-RequestId:"));
        assert!(headers.contains("Content-Type:application/json"));
        assert_eq!(body, r#"{"dgi":{}}"#);
    }

    #[test]
    fn test_audio_frame_round_trips_through_parser() {
        let frame = audio_frame("0123456789abcdef", &[1, 2, 3]);
        let header_len = usize::from(u16::from_be_bytes([frame[0], frame[1]]));
        let headers = std::str::from_utf8(&frame[2..2 + header_len]).unwrap();

        assert!(headers.contains("Path:audio"));
        assert!(headers.contains("Content-Type:audio/x-wav"));
        assert_eq!(&frame[2 + header_len..], &[1, 2, 3]);
    }

    #[test]
    fn test_flush_frame_has_empty_payload() {
        let frame = audio_frame("id", &[]);
        let header_len = usize::from(u16::from_be_bytes([frame[0], frame[1]]));
        assert_eq!(frame.len(), 2 + header_len);
    }
}
