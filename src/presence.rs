//! In-memory presence: which identity currently holds a live channel.
//!
//! One entry per identity. Registering a second channel for the same identity
//! replaces the first (last connection wins); the replaced channel is not
//! closed here, its own transport loop tears it down. Nothing is persisted.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::messages::events::ServerEvent;

/// Outgoing events buffered per channel before pushes start failing.
pub const CHANNEL_CAPACITY: usize = 64;

/// Sending half of one open channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

impl ChannelHandle {
    pub fn open() -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { id: Uuid::now_v7(), tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Best-effort, non-blocking push. Returns false if the channel is full or gone.
    pub fn push(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(channel = %self.id, "channel buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: Mutex<HashMap<String, ChannelHandle>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, ChannelHandle>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `handle` for `identity`, returning the handle it replaced.
    pub fn add(&self, identity: &str, handle: ChannelHandle) -> Option<ChannelHandle> {
        self.entries().insert(identity.to_owned(), handle)
    }

    pub fn remove(&self, identity: &str) -> Option<ChannelHandle> {
        self.entries().remove(identity)
    }

    /// Removes the entry only if it still belongs to `channel`, so a stale
    /// channel closing late cannot evict the connection that replaced it.
    pub fn remove_if_current(&self, identity: &str, channel: Uuid) -> bool {
        let mut entries = self.entries();
        match entries.get(identity) {
            Some(handle) if handle.id == channel => {
                entries.remove(identity);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, identity: &str) -> Option<ChannelHandle> {
        self.entries().get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
