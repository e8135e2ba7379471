//! The relay: persist, forward to the receiver if online, echo to the sender.

use std::sync::Arc;

use crate::{
    presence::{ChannelHandle, PresenceRegistry},
    scope::ChatScope,
    session::Principal,
    timestamp::MonotonicClock,
    AppError, AppResult,
};

use super::{events::ServerEvent, guest::Consultants, message::Message, store::MessageStore};

/// One open channel: who holds it and where to push to it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub principal: Principal,
    pub handle: ChannelHandle,
}

pub struct RelayHub {
    presence: PresenceRegistry,
    store: Arc<dyn MessageStore>,
    clock: MonotonicClock,
    consultants: Consultants,
    max_message_len: usize,
}

impl RelayHub {
    pub fn new(store: Arc<dyn MessageStore>, consultants: Consultants, max_message_len: usize) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            store,
            clock: MonotonicClock::default(),
            consultants,
            max_message_len,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Guests must hold `guest:` identities and nobody else may.
    pub fn admit(&self, principal: &Principal) -> AppResult<()> {
        if !principal.in_own_namespace() {
            tracing::warn!(identity = %principal.identity, role = %principal.role, "refusing principal outside its namespace");
            return Err(AppError::Forbidden(format!("{} cannot act as {}", principal.role, principal.identity)));
        }
        Ok(())
    }

    /// Registers a freshly opened channel for an already resolved principal.
    pub fn open_channel(&self, principal: Principal, handle: ChannelHandle) -> AppResult<Connection> {
        self.admit(&principal)?;
        if let Some(replaced) = self.presence.add(&principal.identity, handle.clone()) {
            tracing::debug!(
                identity = %principal.identity,
                replaced = %replaced.id(),
                "newer channel replaces existing presence"
            );
        }
        tracing::info!(identity = %principal.identity, role = %principal.role, channel = %handle.id(), "channel opened");

        Ok(Connection { principal, handle })
    }

    pub fn close_channel(&self, connection: &Connection) {
        let identity = &connection.principal.identity;
        if !self.presence.remove_if_current(identity, connection.handle.id()) {
            tracing::debug!(identity = %identity, "closed channel was already replaced");
        }
        tracing::info!(identity = %identity, channel = %connection.handle.id(), "channel closed");
    }

    /// The single capability check shared by every entry path.
    pub fn authorize(&self, sender: &Principal, scope: ChatScope, receiver: &str) -> AppResult<()> {
        self.admit(sender)?;
        if !scope.visible_to(sender.role) {
            return Err(AppError::Forbidden(format!("{} cannot send in {scope} scope", sender.role)));
        }
        if sender.is_guest() && !self.consultants.contains(receiver) {
            return Err(AppError::Forbidden(format!("{receiver} is not reachable from a guest channel")));
        }
        Ok(())
    }

    /// Stores the message, then pushes it to the receiver (if online) and back
    /// to the sending channel. Nothing is pushed unless the write succeeded.
    pub async fn send_message_to_user(
        &self,
        from: &Connection,
        receiver: &str,
        content: &str,
        scope: ChatScope,
    ) -> AppResult<Message> {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("message content is empty".to_owned()));
        }
        if content.chars().count() > self.max_message_len {
            return Err(AppError::BadRequest(format!(
                "message exceeds {} characters",
                self.max_message_len
            )));
        }
        if receiver.is_empty() {
            return Err(AppError::BadRequest("receiver is empty".to_owned()));
        }
        self.authorize(&from.principal, scope, receiver)?;

        let message = Message::new(&from.principal.identity, receiver, content, self.clock.now());
        let stored = self.store.append(message).await.inspect_err(|err| {
            tracing::error!(sender = %from.principal.identity, receiver, error = %err, "failed to store message");
        })?;

        let event = ServerEvent::ReceiveMessage {
            scope,
            message: stored.clone(),
        };

        match self.presence.lookup(receiver) {
            Some(handle) if handle.id() != from.handle.id() => {
                if !handle.push(event.clone()) {
                    tracing::debug!(receiver, "receiver channel went away, history will catch up");
                }
            }
            Some(_) => {}
            None => tracing::debug!(receiver, "receiver offline, stored only"),
        }
        from.handle.push(event);

        Ok(stored)
    }
}
