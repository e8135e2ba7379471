//! One transcript as the client sees it: persisted history merged with
//! whatever the live channel delivered, without duplicates.

use time::{Duration, OffsetDateTime};

use crate::messages::Message;

/// Two copies of one message may carry timestamps this far apart: the
/// optimistic local render uses the client clock, the echo the server's.
pub const DEDUP_WINDOW: Duration = Duration::seconds(1);

/// Whether `a` and `b` are the same observed message.
///
/// Stored copies are compared by id. Otherwise sender, receiver and content
/// must match and the timestamps must fall within [`DEDUP_WINDOW`]. Identical
/// texts further apart stay separate messages.
pub fn same_event(a: &Message, b: &Message) -> bool {
    if let (Some(x), Some(y)) = (a.id, b.id) {
        return x == y;
    }
    a.sender == b.sender
        && a.receiver == b.receiver
        && a.content == b.content
        && (a.timestamp - b.timestamp).abs() < DEDUP_WINDOW
}

/// `history ∪ live`, deduplicated and sorted by timestamp. When a stored copy
/// and an optimistic copy collide, the stored one is kept.
pub fn merge(history: &[Message], live: &[Message]) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(history.len() + live.len());
    for message in history.iter().chain(live) {
        match merged.iter_mut().find(|kept| same_event(kept, message)) {
            Some(kept) => {
                if kept.id.is_none() && message.id.is_some() {
                    *kept = message.clone();
                }
            }
            None => merged.push(message.clone()),
        }
    }
    // stable, so equal timestamps keep arrival order
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    pub counterpart: String,
    pub messages: Vec<Message>,
    pub unread: u32,
    pub last_message_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Unseeded,
    Seeding,
    Read,
    Unread(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seed {
    Never,
    Pending { generation: u64, seeded_before: bool },
    Done,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    history: Vec<Message>,
    live: Vec<Message>,
    seed: Seed,
    view: ConversationView,
}

impl Conversation {
    pub fn new(counterpart: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            live: Vec::new(),
            seed: Seed::Never,
            view: ConversationView {
                counterpart: counterpart.into(),
                messages: Vec::new(),
                unread: 0,
                last_message_at: None,
            },
        }
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn status(&self) -> ConversationStatus {
        match self.seed {
            Seed::Pending { .. } => ConversationStatus::Seeding,
            _ if self.view.unread > 0 => ConversationStatus::Unread(self.view.unread),
            Seed::Done => ConversationStatus::Read,
            Seed::Never => ConversationStatus::Unseeded,
        }
    }

    pub(crate) fn begin_seed(&mut self, generation: u64) {
        let seeded_before = match self.seed {
            Seed::Done => true,
            Seed::Pending { seeded_before, .. } => seeded_before,
            Seed::Never => false,
        };
        self.seed = Seed::Pending { generation, seeded_before };
    }

    pub(crate) fn is_pending(&self, generation: u64) -> bool {
        matches!(self.seed, Seed::Pending { generation: g, .. } if g == generation)
    }

    /// Replaces the history snapshot. Loading the data counts as reading it.
    ///
    /// Local copies the relay never confirmed are dropped here; if one was
    /// stored after all, its echo puts it back.
    pub(crate) fn finish_seed(&mut self, history: Vec<Message>) {
        self.live
            .retain(|live| live.id.is_some() && !history.iter().any(|stored| same_event(stored, live)));
        self.history = history;
        self.seed = Seed::Done;
        self.view.unread = 0;
        self.refresh();
    }

    /// A failed fetch leaves unread state alone so the caller can retry.
    pub(crate) fn fail_seed(&mut self) {
        if let Seed::Pending { seeded_before, .. } = self.seed {
            self.seed = if seeded_before { Seed::Done } else { Seed::Never };
        }
    }

    pub(crate) fn push_live(&mut self, message: Message) {
        self.live.push(message);
        self.refresh();
    }

    pub(crate) fn bump_unread(&mut self) -> u32 {
        self.view.unread += 1;
        self.view.unread
    }

    fn refresh(&mut self) {
        self.view.messages = merge(&self.history, &self.live);
        self.view.last_message_at = self.view.messages.last().map(|m| m.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    const T0: OffsetDateTime = datetime!(2025-05-01 09:00 UTC);

    fn msg(sender: &str, receiver: &str, content: &str, offset_ms: i64) -> Message {
        Message::new(sender, receiver, content, T0 + Duration::milliseconds(offset_ms))
    }

    fn stored(sender: &str, receiver: &str, content: &str, offset_ms: i64) -> Message {
        Message {
            id: Some(Uuid::now_v7()),
            ..msg(sender, receiver, content, offset_ms)
        }
    }

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn live_suffix_overlapping_history_is_not_doubled() {
        let history = vec![stored("a", "b", "1", 0), stored("b", "a", "2", 1000)];
        let mut live = history.clone();
        live.push(stored("a", "b", "3", 2000));

        let merged = merge(&history, &live);
        assert_eq!(contents(&merged), vec!["1", "2", "3"]);
    }

    #[test]
    fn optimistic_copy_is_replaced_by_the_echo() {
        let optimistic = msg("a", "b", "hi", 0);
        let echo = stored("a", "b", "hi", 400);

        let merged = merge(&[], &[optimistic, echo.clone()]);
        assert_eq!(merged, vec![echo]);
    }

    #[test]
    fn echo_arriving_before_optimistic_copy_still_wins() {
        let echo = stored("a", "b", "hi", 0);
        let optimistic = msg("a", "b", "hi", -300);

        let merged = merge(&[], &[echo.clone(), optimistic]);
        assert_eq!(merged, vec![echo]);
    }

    #[test]
    fn identical_text_outside_window_is_kept_twice() {
        let merged = merge(&[], &[msg("a", "b", "ok", 0), msg("a", "b", "ok", 1500)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn distinct_stored_messages_are_never_merged() {
        let merged = merge(&[stored("a", "b", "ok", 0), stored("a", "b", "ok", 10)], &[]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn order_follows_timestamps_not_arrival() {
        let history = vec![stored("a", "b", "second", 2000)];
        let live = vec![stored("b", "a", "third", 3000), stored("a", "b", "first", 1000)];
        assert_eq!(contents(&merge(&history, &live)), vec!["first", "second", "third"]);
    }

    #[test]
    fn seeding_resets_unread_and_prunes_covered_live_messages() {
        let mut conversation = Conversation::new("b");
        let echo = stored("b", "a", "hey", 0);
        conversation.push_live(echo.clone());
        conversation.bump_unread();
        assert_eq!(conversation.status(), ConversationStatus::Unread(1));

        conversation.begin_seed(1);
        assert_eq!(conversation.status(), ConversationStatus::Seeding);
        conversation.finish_seed(vec![echo.clone()]);

        assert_eq!(conversation.status(), ConversationStatus::Read);
        assert_eq!(conversation.view().messages, vec![echo.clone()]);
        assert_eq!(conversation.view().last_message_at, Some(echo.timestamp));
        assert!(conversation.live.is_empty());
    }

    #[test]
    fn rejected_send_is_gone_after_a_refresh() {
        let mut conversation = Conversation::new("s1");
        conversation.push_live(msg("g", "s1", "hello?", 0));
        assert_eq!(conversation.view().messages.len(), 1);

        conversation.begin_seed(1);
        conversation.finish_seed(Vec::new());
        assert!(conversation.view().messages.is_empty());
    }

    #[test]
    fn echo_after_refresh_restores_an_in_flight_send() {
        let mut conversation = Conversation::new("b");
        conversation.push_live(msg("a", "b", "on its way", 0));
        conversation.begin_seed(1);
        conversation.finish_seed(Vec::new());

        let echo = stored("a", "b", "on its way", 300);
        conversation.push_live(echo.clone());
        assert_eq!(conversation.view().messages, vec![echo]);
    }

    #[test]
    fn failed_seed_keeps_unread_and_previous_state() {
        let mut conversation = Conversation::new("b");
        conversation.bump_unread();
        conversation.begin_seed(1);
        conversation.fail_seed();
        assert_eq!(conversation.status(), ConversationStatus::Unread(1));

        let mut seeded = Conversation::new("b");
        seeded.begin_seed(1);
        seeded.finish_seed(Vec::new());
        seeded.begin_seed(2);
        seeded.fail_seed();
        assert_eq!(seeded.status(), ConversationStatus::Read);
    }
}
