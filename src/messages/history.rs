use std::sync::Arc;

use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{session::Principal, AppError, AppResult, AppState};

use super::{message::{ConversationSummary, Message}, store::MessageStore};

#[derive(Deserialize)]
pub(crate) struct HistoryQuery {
    a: String,
    b: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn history(
    Query(HistoryQuery { a, b }): Query<HistoryQuery>,
    State(store): State<Arc<dyn MessageStore>>,
    session: Session,
) -> AppResult<Json<Vec<Message>>> {
    let principal = Principal::require(&session).await?;
    if principal.identity != a && principal.identity != b {
        return Err(AppError::Forbidden("only participants may read a transcript".to_owned()));
    }

    Ok(Json(store.history(&a, &b).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    State(store): State<Arc<dyn MessageStore>>,
    session: Session,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let principal = Principal::require(&session).await?;
    Ok(Json(store.counterparts(&principal.identity).await?))
}
