//! Entry path for anonymous visitors. The guest names itself with a
//! client-generated UUID, acts as `guest:<uuid>`, and may only talk to the
//! configured consultants.

use std::{collections::BTreeSet, sync::Arc};

use axum::{
    debug_handler,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    scope::ChatScope,
    session::{guest_identity, Principal},
    AppError, AppResult, AppState,
};

use super::{hub::RelayHub, message::Message, store::MessageStore, ws};

/// Staff identities reachable from a guest channel.
#[derive(Debug, Clone, Default)]
pub struct Consultants(Arc<BTreeSet<String>>);

impl Consultants {
    pub fn new(identities: impl IntoIterator<Item = String>) -> Self {
        Self(Arc::new(identities.into_iter().collect()))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Deserialize)]
pub(crate) struct GuestQuery {
    guest_id: String,
}

#[derive(Deserialize)]
pub(crate) struct GuestHistoryQuery {
    guest_id: String,
    consultant: String,
}

fn parse_guest_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("guest_id must be a UUID".to_owned()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn guest_ws(
    Query(GuestQuery { guest_id }): Query<GuestQuery>,
    State(hub): State<Arc<RelayHub>>,

    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let principal = Principal::guest(parse_guest_id(&guest_id)?);
    hub.admit(&principal)?;

    Ok(ws.on_upgrade(move |socket| {
        ws::serve_channel(socket, hub, principal, Some(ChatScope::Guest))
    }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn guest_history(
    Query(GuestHistoryQuery { guest_id, consultant }): Query<GuestHistoryQuery>,
    State(store): State<Arc<dyn MessageStore>>,
    State(consultants): State<Consultants>,
) -> AppResult<Json<Vec<Message>>> {
    let guest = guest_identity(parse_guest_id(&guest_id)?);
    if !consultants.contains(&consultant) {
        return Err(AppError::Forbidden(format!("{consultant} is not a consultant")));
    }

    Ok(Json(store.history(&guest, &consultant).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn consultants(State(consultants): State<Consultants>) -> Json<Vec<String>> {
    Json(consultants.iter().map(str::to_owned).collect())
}
