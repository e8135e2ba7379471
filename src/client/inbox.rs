use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{messages::Message, scope::ChatScope, timestamp};

use super::conversation::{Conversation, ConversationStatus, ConversationView};

/// Proof that a history fetch was started for a counterpart. A result is only
/// applied if its ticket is still the latest one for the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTicket {
    pub scope: ChatScope,
    pub counterpart: String,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Applied,
    /// The user moved on before the fetch resolved; the result was dropped.
    Stale,
    /// The fetch failed; unread state is untouched and the caller should retry.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// The event does not involve the local identity.
    Ignored,
    Appended,
    Unread(u32),
}

/// All conversations of one scope for one local identity.
#[derive(Debug, Clone)]
pub struct Inbox {
    local: String,
    scope: ChatScope,
    conversations: BTreeMap<String, Conversation>,
    active: Option<String>,
    generation: u64,
}

impl Inbox {
    pub fn new(local: impl Into<String>, scope: ChatScope) -> Self {
        Self {
            local: local.into(),
            scope,
            conversations: BTreeMap::new(),
            active: None,
            generation: 0,
        }
    }

    pub fn scope(&self) -> ChatScope {
        self.scope
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Makes `counterpart` the open conversation and starts a history fetch for it.
    pub fn open(&mut self, counterpart: &str) -> SeedTicket {
        self.generation += 1;
        let generation = self.generation;
        self.active = Some(counterpart.to_owned());
        self.conversation_mut(counterpart).begin_seed(generation);

        SeedTicket {
            scope: self.scope,
            counterpart: counterpart.to_owned(),
            generation,
        }
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn apply_history<E: std::fmt::Display>(
        &mut self,
        ticket: &SeedTicket,
        result: Result<Vec<Message>, E>,
    ) -> SeedOutcome {
        if self.active.as_deref() != Some(ticket.counterpart.as_str()) {
            return SeedOutcome::Stale;
        }
        let Some(conversation) = self.conversations.get_mut(&ticket.counterpart) else {
            return SeedOutcome::Stale;
        };
        if !conversation.is_pending(ticket.generation) {
            return SeedOutcome::Stale;
        }

        match result {
            Ok(history) => {
                let local = &self.local;
                let history = history
                    .into_iter()
                    .filter(|m| m.is_between(local, &ticket.counterpart))
                    .collect();
                conversation.finish_seed(history);
                SeedOutcome::Applied
            }
            Err(err) => {
                tracing::warn!(counterpart = %ticket.counterpart, error = %err, "history fetch failed");
                conversation.fail_seed();
                SeedOutcome::Failed
            }
        }
    }

    /// Merges one live event. Counts it as unread only if it was sent to us
    /// and its conversation is not the open one.
    pub fn receive(&mut self, message: &Message) -> LiveOutcome {
        let Some(counterpart) = message.counterpart_of(&self.local) else {
            return LiveOutcome::Ignored;
        };
        let counterpart = counterpart.to_owned();
        let inbound = message.receiver == self.local;
        let is_active = self.active.as_deref() == Some(counterpart.as_str());

        let conversation = self.conversation_mut(&counterpart);
        conversation.push_live(message.clone());

        if inbound && !is_active {
            LiveOutcome::Unread(conversation.bump_unread())
        } else {
            LiveOutcome::Appended
        }
    }

    /// Renders an outgoing message before the relay confirms it.
    pub fn record_outgoing(&mut self, receiver: &str, content: &str, at: OffsetDateTime) -> Message {
        let message = Message::new(&self.local, receiver, content, timestamp::truncate_millis(at));
        self.conversation_mut(receiver).push_live(message.clone());
        message
    }

    pub fn view(&self, counterpart: &str) -> Option<&ConversationView> {
        self.conversations.get(counterpart).map(Conversation::view)
    }

    pub fn status(&self, counterpart: &str) -> ConversationStatus {
        self.conversations
            .get(counterpart)
            .map(Conversation::status)
            .unwrap_or(ConversationStatus::Unseeded)
    }

    /// Conversation views, most recent activity first.
    pub fn views(&self) -> Vec<&ConversationView> {
        let mut views: Vec<&ConversationView> = self.conversations.values().map(Conversation::view).collect();
        views.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        views
    }

    pub fn unread_total(&self) -> u32 {
        self.conversations.values().map(|c| c.view().unread).sum()
    }

    fn conversation_mut(&mut self, counterpart: &str) -> &mut Conversation {
        self.conversations
            .entry(counterpart.to_owned())
            .or_insert_with(|| Conversation::new(counterpart))
    }
}
