//! Client side of the chat: the reconciliation engine that turns history
//! plus live events into per-conversation views, and the transport it reads from.

pub mod connection;
pub mod conversation;
pub mod inbox;
pub mod workspace;

pub use connection::{ChatConnection, ClientConfig, ClientError, Credentials, HistoryClient};
pub use conversation::{ConversationStatus, ConversationView};
pub use inbox::{Inbox, LiveOutcome, SeedOutcome, SeedTicket};
pub use workspace::{UnreadSummary, Workspace};
