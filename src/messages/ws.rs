use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        ws::{Message as Frame, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;

use crate::{
    presence::ChannelHandle,
    scope::ChatScope,
    session::Principal,
    AppResult, AppState,
};

use super::{events::{ClientCommand, ServerEvent}, hub::RelayHub};

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    State(hub): State<Arc<RelayHub>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    // rejected before upgrade, so presence never sees an unresolved identity
    let principal = Principal::require(&session).await?;
    hub.admit(&principal)?;

    Ok(ws.on_upgrade(move |socket| serve_channel(socket, hub, principal, None)))
}

/// Runs one channel until the client goes away. `forced_scope` pins every
/// send to a single scope regardless of what the client asks for.
pub(crate) async fn serve_channel(
    socket: WebSocket,
    hub: Arc<RelayHub>,
    principal: Principal,
    forced_scope: Option<ChatScope>,
) {
    let (handle, mut rx) = ChannelHandle::open();
    let connection = match hub.open_channel(principal, handle) {
        Ok(connection) => connection,
        Err(err) => {
            tracing::warn!(error = %err, "channel refused after upgrade");
            return;
        }
    };
    let (mut sender, mut receiver) = socket.split();

    let mut push_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;

        loop {
            let frame = tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match serde_json::to_string(&event) {
                        Ok(json) => Frame::text(json),
                        Err(err) => {
                            tracing::warn!(error = %err, "could not encode event");
                            continue;
                        }
                    }
                }
                _ = ping.tick() => Frame::Ping(Default::default()),
            };

            if sender.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            _ = &mut push_task => break,
        };

        let text = match frame {
            Some(Ok(Frame::Text(text))) => text,
            Some(Ok(Frame::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                tracing::debug!(identity = %connection.principal.identity, error = %err, "channel read failed");
                break;
            }
        };

        let command = match serde_json::from_str::<ClientCommand>(text.as_str()) {
            Ok(command) => command,
            Err(err) => {
                connection.handle.push(ServerEvent::Error {
                    message: format!("malformed command: {err}"),
                });
                continue;
            }
        };

        match command {
            ClientCommand::SendMessageToUser { receiver, content, scope } => {
                let scope = forced_scope
                    .or(scope)
                    .unwrap_or_else(|| ChatScope::default_for(connection.principal.role));

                if let Err(err) = hub.send_message_to_user(&connection, &receiver, &content, scope).await {
                    connection.handle.push(ServerEvent::Error {
                        message: err.public_message(),
                    });
                }
            }
        }
    }

    hub.close_channel(&connection);
    push_task.abort();
}
