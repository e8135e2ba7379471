pub mod client;
pub mod config;
pub mod db;
pub mod messages;
pub mod presence;
pub mod scope;
pub mod session;
pub mod timestamp;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    messages::{guest::Consultants, hub::RelayHub, store::{MessageStore, SqliteMessageStore}},
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub hub: Arc<RelayHub>,
    pub consultants: Consultants,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(db_pool));
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<dyn MessageStore>, config: &Config) -> Self {
        let consultants = Consultants::new(config.consultants.iter().cloned());
        let hub = RelayHub::new(store.clone(), consultants.clone(), config.max_message_len);
        Self {
            store,
            hub: Arc::new(hub),
            consultants,
        }
    }
}

/// All messaging routes, nested under `/chat`. Session and CORS layers are
/// added by the caller so the authentication collaborator can share them.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/chat", messages::router())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("message store: {0}")]
    Store(#[from] sqlx::Error),
    #[error("session: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AppError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Store(_) | AppError::Session(_) | AppError::Json(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        }
    }

    /// Text safe to hand back to a client; internal causes are not exposed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Store(_) => "message could not be stored".to_owned(),
            AppError::Session(_) | AppError::Json(_) | AppError::Internal(_) => {
                "an internal error occurred".to_owned()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        (
            status,
            Json(ErrorBody {
                code,
                message: self.public_message(),
            }),
        )
            .into_response()
    }
}
