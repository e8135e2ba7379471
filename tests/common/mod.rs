#![allow(dead_code)]

use std::time::Duration;

use axum::{extract::Path, routing::post, Router};
use consult_relay::{
    client::ChatConnection,
    config::Config,
    db,
    messages::events::{ClientCommand, ServerEvent},
    routes,
    scope::ChatScope,
    session::{self, Principal, Role},
    AppResult, AppState,
};
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

/// Stands in for the authentication collaborator.
async fn sign_in(Path((identity, role)): Path<(String, Role)>, session: Session) -> AppResult<()> {
    session::sign_in(&session, &Principal::new(identity, role)).await
}

pub fn test_config(consultants: &[&str]) -> Config {
    Config {
        database_url: "sqlite::memory:".to_owned(),
        consultants: consultants.iter().map(|c| c.to_string()).collect(),
        ..Config::default()
    }
}

pub async fn test_state(consultants: &[&str]) -> AppState {
    let config = test_config(consultants);
    let db_pool = db::connect(&config.database_url).await.unwrap();
    AppState::new(db_pool, &config)
}

pub fn app_with(state: AppState) -> Router {
    routes()
        .route("/test/sign-in/{identity}/{role}", post(sign_in))
        .with_state(state)
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
}

pub async fn test_app(consultants: &[&str]) -> Router {
    app_with(test_state(consultants).await)
}

/// Serves the relay on an ephemeral port and returns its base URL.
pub async fn spawn_relay(consultants: &[&str]) -> String {
    spawn_relay_with(test_state(consultants).await).await
}

pub async fn spawn_relay_with(state: AppState) -> String {
    let app = app_with(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Signs `identity` in and returns the cookie to present on later requests.
pub async fn sign_in_cookie(base: &str, identity: &str, role: &str) -> String {
    let response = reqwest::Client::new()
        .post(format!("{base}/test/sign-in/{identity}/{role}"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "sign-in failed: {}", response.status());

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

pub async fn next_event(conn: &mut ChatConnection) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), conn.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

pub async fn no_event_within(conn: &mut ChatConnection, wait: Duration) -> bool {
    tokio::time::timeout(wait, conn.next_event()).await.is_err()
}

/// Round-trips a message so the relay has certainly registered this channel.
pub async fn wait_registered(conn: &mut ChatConnection, scope: ChatScope) {
    conn.send(ClientCommand::SendMessageToUser {
        receiver: "nobody".to_owned(),
        content: "ping".to_owned(),
        scope: Some(scope),
    })
    .await
    .unwrap();
    match next_event(conn).await {
        ServerEvent::ReceiveMessage { .. } => {}
        other => panic!("expected echo, got {other:?}"),
    }
}
