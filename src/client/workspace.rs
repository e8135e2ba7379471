use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::{
    messages::{
        events::{ClientCommand, ServerEvent},
        Message,
    },
    scope::ChatScope,
    session::Role,
};

use super::inbox::{Inbox, LiveOutcome, SeedOutcome, SeedTicket};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadSummary {
    pub internal: u32,
    pub patient: u32,
    pub guest: u32,
}

impl UnreadSummary {
    pub fn total(&self) -> u32 {
        self.internal + self.patient + self.guest
    }

    pub fn get(&self, scope: ChatScope) -> u32 {
        match scope {
            ChatScope::Internal => self.internal,
            ChatScope::Patient => self.patient,
            ChatScope::Guest => self.guest,
        }
    }
}

/// Client-side chat state for one signed-in identity: one inbox per scope
/// its role may see. Events for any other scope are dropped on arrival.
#[derive(Debug, Clone)]
pub struct Workspace {
    local: String,
    role: Role,
    inboxes: BTreeMap<ChatScope, Inbox>,
}

impl Workspace {
    pub fn new(local: impl Into<String>, role: Role) -> Self {
        let local = local.into();
        let inboxes = ChatScope::ALL
            .into_iter()
            .filter(|scope| scope.visible_to(role))
            .map(|scope| (scope, Inbox::new(local.clone(), scope)))
            .collect();

        Self { local, role, inboxes }
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn inbox(&self, scope: ChatScope) -> Option<&Inbox> {
        self.inboxes.get(&scope)
    }

    pub fn inbox_mut(&mut self, scope: ChatScope) -> Option<&mut Inbox> {
        self.inboxes.get_mut(&scope)
    }

    /// Feeds one pushed frame in. Returns `None` for error frames and for
    /// scopes this role cannot see.
    pub fn apply(&mut self, event: &ServerEvent) -> Option<LiveOutcome> {
        match event {
            ServerEvent::ReceiveMessage { scope, message } => {
                let Some(inbox) = self.inboxes.get_mut(scope) else {
                    tracing::debug!(%scope, role = %self.role, "dropping event for hidden scope");
                    return None;
                };
                Some(inbox.receive(message))
            }
            ServerEvent::Error { message } => {
                tracing::warn!(error = %message, "relay rejected a command");
                None
            }
        }
    }

    pub fn open(&mut self, scope: ChatScope, counterpart: &str) -> Option<SeedTicket> {
        self.inboxes.get_mut(&scope).map(|inbox| inbox.open(counterpart))
    }

    pub fn apply_history<E: std::fmt::Display>(
        &mut self,
        ticket: &SeedTicket,
        result: Result<Vec<Message>, E>,
    ) -> SeedOutcome {
        match self.inboxes.get_mut(&ticket.scope) {
            Some(inbox) => inbox.apply_history(ticket, result),
            None => SeedOutcome::Stale,
        }
    }

    /// Renders the message locally and returns the command to put on the wire.
    pub fn send(&mut self, scope: ChatScope, receiver: &str, content: &str) -> Option<ClientCommand> {
        self.send_at(scope, receiver, content, OffsetDateTime::now_utc())
    }

    pub fn send_at(
        &mut self,
        scope: ChatScope,
        receiver: &str,
        content: &str,
        at: OffsetDateTime,
    ) -> Option<ClientCommand> {
        let inbox = self.inboxes.get_mut(&scope)?;
        inbox.record_outgoing(receiver, content, at);

        Some(ClientCommand::SendMessageToUser {
            receiver: receiver.to_owned(),
            content: content.to_owned(),
            scope: Some(scope),
        })
    }

    pub fn unread(&self) -> UnreadSummary {
        let count = |scope: ChatScope| self.inboxes.get(&scope).map_or(0, Inbox::unread_total);
        UnreadSummary {
            internal: count(ChatScope::Internal),
            patient: count(ChatScope::Patient),
            guest: count(ChatScope::Guest),
        }
    }
}
