//! The speech WebSocket protocol shared by recognition and translation.
use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::HeaderValue,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{SUBSCRIPTION_KEY_HEADER, cancellation_code, messages::ServerMessage};
use speech_bridge_core::{
    AudioSource, CancellationDetails, CancellationErrorCode, EventSender, SessionEvent,
};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A new request or connection id: a v4 UUID without hyphens, uppercase.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A text message: header lines, an empty line, the body.
pub fn text_message(path: &str, request_id: &str, content_type: &str, body: &str) -> String {
    format!(
        "Path: {path}\r\nX-RequestId: {request_id}\r\nX-Timestamp: {}\r\nContent-Type: {content_type}\r\n\r\n{body}",
        timestamp()
    )
}

/// A binary audio message: the header length as big endian `u16`, the headers, the payload.
///
/// An empty payload marks the end of the audio stream.
pub fn audio_message(request_id: &str, payload: &[u8]) -> Result<Bytes> {
    let headers = format!(
        "Path: audio\r\nX-RequestId: {request_id}\r\nX-Timestamp: {}\r\nContent-Type: audio/x-wav\r\n",
        timestamp()
    );
    let header_len = u16::try_from(headers.len()).context("Audio message headers too long")?;
    let mut message = BytesMut::with_capacity(2 + headers.len() + payload.len());
    message.put_u16(header_len);
    message.put_slice(headers.as_bytes());
    message.put_slice(payload);
    Ok(message.freeze())
}

fn speech_config(connection_id: &str) -> String {
    serde_json::json!({
        "context": {
            "system": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "build": "Rust",
                "lang": "Rust",
            },
            "os": {
                "platform": std::env::consts::OS,
                "name": std::env::consts::FAMILY,
                "version": std::env::consts::ARCH,
            },
            "audio": {
                "source": {
                    "connectivity": "Unknown",
                    "manufacturer": "Unknown",
                    "model": "Unknown",
                    "type": "Stream",
                }
            },
            "connectionId": connection_id,
        }
    })
    .to_string()
}

/// Connect failures the service reports through the handshake status.
pub enum ConnectError {
    Canceled(CancellationDetails),
    Other(anyhow::Error),
}

pub async fn connect(
    url: &Url,
    subscription_key: &str,
    connection_id: &str,
) -> Result<Socket, ConnectError> {
    let request =
        client_request(url, subscription_key, connection_id).map_err(ConnectError::Other)?;

    match connect_async(request).await {
        Ok((socket, _response)) => Ok(socket),
        Err(tungstenite::Error::Http(response)) => {
            let status = response.status();
            let body = response
                .body()
                .as_ref()
                .map(|body| String::from_utf8_lossy(body).to_string())
                .unwrap_or_default();
            Err(ConnectError::Canceled(CancellationDetails::error(
                cancellation_code(status.as_u16()),
                format!("WebSocket upgrade failed with {status}. {body}"),
            )))
        }
        Err(e) => Err(ConnectError::Canceled(CancellationDetails::error(
            CancellationErrorCode::ConnectionFailure,
            format!("Connection to {url} failed: {e}"),
        ))),
    }
}

fn client_request(url: &Url, subscription_key: &str, connection_id: &str) -> Result<Request> {
    let mut request = url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        SUBSCRIPTION_KEY_HEADER,
        HeaderValue::from_str(subscription_key).context("Invalid subscription key")?,
    );
    headers.insert("X-ConnectionId", HeaderValue::from_str(connection_id)?);
    Ok(request)
}

/// How to turn server messages into session events.
pub trait MessageHandler<R>: Send {
    /// Events for one server message. Messages not relevant to the consumer produce none.
    fn handle(&mut self, message: &ServerMessage) -> Result<Vec<SessionEvent<R>>>;
}

/// Drives one session: connects, streams the audio, forwards events until the service ends the
/// turn or the consumer stops the session.
///
/// A send failure means the consumer stopped the session, this is not an error.
pub async fn run_session<R: Send>(
    url: Url,
    subscription_key: String,
    audio: AudioSource,
    sender: EventSender<R>,
    mut handler: impl MessageHandler<R>,
) -> Result<()> {
    let session_id = new_id();

    let connected = tokio::select! {
        biased;

        _ = sender.stop_requested() => {
            debug!("Stop requested while connecting");
            return Ok(());
        }
        connected = connect(&url, &subscription_key, &session_id) => connected,
    };

    let socket = match connected {
        Ok(socket) => socket,
        Err(ConnectError::Canceled(details)) => {
            warn!("{details}");
            let _ = sender.send(SessionEvent::Canceled(details)).await;
            let _ = sender.send(SessionEvent::SessionStopped { session_id }).await;
            return Ok(());
        }
        Err(ConnectError::Other(e)) => return Err(e),
    };

    info!(%session_id, "Session started");
    if sender
        .send(SessionEvent::SessionStarted {
            session_id: session_id.clone(),
        })
        .await
        .is_err()
    {
        return Ok(());
    }

    let (mut sink, mut stream) = socket.split();
    sink.send(Message::Text(
        text_message(
            "speech.config",
            &session_id,
            "application/json",
            &speech_config(&session_id),
        )
        .into(),
    ))
    .await
    .context("Sending speech.config")?;

    let mut audio = audio.into_stream();
    let mut audio_done = false;

    let terminal = loop {
        tokio::select! {
            biased;

            _ = sender.stop_requested() => {
                debug!("Stop requested");
                let _ = sink.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                }))).await;
                return Ok(());
            }

            chunk = audio.next(), if !audio_done => {
                let payload = match chunk {
                    Some(chunk) => chunk.context("Reading audio")?,
                    None => {
                        debug!("End of audio");
                        audio_done = true;
                        Bytes::new()
                    }
                };
                if payload.is_empty() && !audio_done {
                    continue;
                }
                sink.send(Message::Binary(audio_message(&session_id, &payload)?))
                    .await
                    .context("Sending audio")?;
            }

            message = stream.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        break close_reason(frame);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        break Some(CancellationDetails::error(
                            CancellationErrorCode::ConnectionFailure,
                            e.to_string(),
                        ));
                    }
                    None => break None,
                };
                let message = ServerMessage::parse(text.as_str())?;
                debug!(path = %message.path, "Received");
                if message.path == "turn.end" && audio_done {
                    break Some(CancellationDetails::end_of_stream());
                }
                for event in handler.handle(&message)? {
                    let terminal = event.is_terminal();
                    let canceled = matches!(event, SessionEvent::Canceled(_));
                    if sender.send(event).await.is_err() {
                        return Ok(());
                    }
                    if terminal {
                        // The service does not continue after an error.
                        if canceled {
                            let _ = sender.send(SessionEvent::SessionStopped { session_id }).await;
                        }
                        return Ok(());
                    }
                }
            }
        }
    };

    if let Some(details) = terminal {
        if details.is_error() {
            warn!("{details}");
        }
        if sender.send(SessionEvent::Canceled(details)).await.is_err() {
            return Ok(());
        }
    }
    info!(%session_id, "Session stopped");
    let _ = sender.send(SessionEvent::SessionStopped { session_id }).await;
    Ok(())
}

fn close_reason(frame: Option<CloseFrame>) -> Option<CancellationDetails> {
    let frame = frame?;
    let code = match frame.code {
        CloseCode::Normal => return None,
        CloseCode::Policy => CancellationErrorCode::BadRequest,
        CloseCode::Size | CloseCode::Invalid | CloseCode::Unsupported => {
            CancellationErrorCode::BadRequest
        }
        CloseCode::Error => CancellationErrorCode::ServiceError,
        CloseCode::Again => CancellationErrorCode::TooManyRequests,
        _ => CancellationErrorCode::ConnectionFailure,
    };
    Some(CancellationDetails::error(
        code,
        format!("Connection closed by the service: {} {}", frame.code, frame.reason),
    ))
}
