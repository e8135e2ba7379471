//! Client transport: one owned websocket channel plus history fetches.
//!
//! A [`ChatConnection`] is acquired with [`ChatConnection::connect`] and
//! released with [`ChatConnection::close`] or by dropping it.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{header::COOKIE, HeaderValue},
        Message as Frame,
    },
    MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;

use crate::messages::{
    events::{ClientCommand, ServerEvent},
    Message,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("channel closed")]
    Closed,
}

/// A fresh guest identity, valid for one browser session.
pub fn new_guest_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
pub enum Credentials {
    /// Cookie header issued by the authentication collaborator.
    Session { cookie: String },
    Guest { guest_id: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where the chat routes are mounted, e.g. `http://localhost:8080/chat`.
    pub base_url: String,
    pub credentials: Credentials,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }

    pub fn guest(base_url: impl Into<String>, guest_id: impl Into<String>) -> Self {
        Self::new(base_url, Credentials::Guest { guest_id: guest_id.into() })
    }

    pub fn session(base_url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self::new(base_url, Credentials::Session { cookie: cookie.into() })
    }

    fn cookie(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Session { cookie } => Some(cookie),
            Credentials::Guest { .. } => None,
        }
    }

    fn ws_url(&self) -> Result<String, ClientError> {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ClientError::Endpoint(self.base_url.clone()));
        };

        Ok(match &self.credentials {
            Credentials::Session { .. } => format!("{base}/ws"),
            Credentials::Guest { guest_id } => format!("{base}/guest/ws?guest_id={guest_id}"),
        })
    }

    fn request(&self) -> Result<Request, ClientError> {
        let mut request = self.ws_url()?.into_client_request()?;
        if let Some(cookie) = self.cookie() {
            let value = HeaderValue::from_str(cookie).map_err(|_| ClientError::Endpoint("cookie is not a valid header".to_owned()))?;
            request.headers_mut().insert(COOKIE, value);
        }
        Ok(request)
    }
}

/// Rejections by the server (bad guest id, no session) are not worth retrying.
fn is_retryable(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::Http(response) => !response.status().is_client_error(),
        tungstenite::Error::Url(_) => false,
        _ => true,
    }
}

async fn connect_with_backoff(config: &ClientConfig) -> Result<Socket, ClientError> {
    let mut backoff = config.initial_backoff;
    let mut attempt = 1;
    loop {
        match connect_async(config.request()?).await {
            Ok((socket, _response)) => return Ok(socket),
            Err(err) if attempt < config.max_attempts && is_retryable(&err) => {
                tracing::warn!(attempt, error = %err, "chat connect failed, retrying in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

pub struct ChatConnection {
    outgoing: Option<mpsc::Sender<ClientCommand>>,
    events: mpsc::Receiver<ServerEvent>,
    task: JoinHandle<()>,
}

impl ChatConnection {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let socket = connect_with_backoff(config).await?;
        let (mut sink, mut stream) = socket.split();
        let (outgoing, mut commands) = mpsc::channel::<ClientCommand>(32);
        let (events_tx, events) = mpsc::channel::<ServerEvent>(64);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    command = commands.recv() => {
                        let Some(command) = command else {
                            let _ = sink.close().await;
                            break;
                        };
                        let json = match serde_json::to_string(&command) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "could not encode command");
                                continue;
                            }
                        };
                        if sink.send(Frame::text(json)).await.is_err() {
                            break;
                        }
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(Frame::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(text.as_str()) {
                                Ok(event) => {
                                    if events_tx.send(event).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => tracing::warn!(error = %err, "unreadable frame from relay"),
                            }
                        }
                        Some(Ok(Frame::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::debug!(error = %err, "chat channel read failed");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            outgoing: Some(outgoing),
            events,
            task,
        })
    }

    pub async fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        let outgoing = self.outgoing.as_ref().ok_or(ClientError::Closed)?;
        outgoing.send(command).await.map_err(|_| ClientError::Closed)
    }

    /// Next pushed event, or `None` once the channel is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Closes the channel gracefully and waits for the transport task. A task
    /// stuck behind a full event buffer is aborted after [`CLOSE_GRACE`].
    pub async fn close(mut self) {
        self.outgoing.take();
        if tokio::time::timeout(CLOSE_GRACE, &mut self.task).await.is_err() {
            tracing::debug!("chat transport did not wind down, aborting");
            self.task.abort();
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Request/response access to transcripts.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HistoryClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
        }
    }

    /// Transcript between `local` and `counterpart`, oldest first. A guest's
    /// counterpart has to be one of the consultants.
    pub async fn history(&self, local: &str, counterpart: &str) -> Result<Vec<Message>, ClientError> {
        let request = match &self.credentials {
            Credentials::Session { cookie } => self
                .http
                .get(format!("{}/history", self.base_url))
                .query(&[("a", local), ("b", counterpart)])
                .header(reqwest::header::COOKIE, cookie),
            Credentials::Guest { guest_id } => self
                .http
                .get(format!("{}/guest/history", self.base_url))
                .query(&[("guest_id", guest_id.as_str()), ("consultant", counterpart)]),
        };

        Ok(request.send().await?.error_for_status()?.json().await?)
    }

    pub async fn consultants(&self) -> Result<Vec<String>, ClientError> {
        Ok(self
            .http
            .get(format!("{}/guest/consultants", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}
