pub mod events;
pub mod guest;
mod history;
pub mod hub;
pub mod message;
pub mod store;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use message::{ConversationSummary, Message};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/history", get(history::history))
        .route("/conversations", get(history::conversations))
        .route("/guest/ws", get(guest::guest_ws))
        .route("/guest/history", get(guest::guest_history))
        .route("/guest/consultants", get(guest::consultants))
}
