use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{timestamp, AppError, AppResult};

use super::message::{ConversationSummary, Message};

/// Durable, append-only message log. No dedup happens here.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Stores `message` and returns it with its assigned id.
    async fn append(&self, message: Message) -> AppResult<Message>;

    /// Every message between `a` and `b`, oldest first.
    async fn history(&self, a: &str, b: &str) -> AppResult<Vec<Message>>;

    /// Everyone `identity` has exchanged messages with, most recent first.
    async fn counterparts(&self, identity: &str) -> AppResult<Vec<ConversationSummary>>;
}

#[derive(Debug, Clone)]
pub struct SqliteMessageStore {
    db_pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

type MessageRow = (String, String, String, String, String);

fn from_row((id, sender, receiver, content, created_at): MessageRow) -> AppResult<Message> {
    Ok(Message {
        id: Some(Uuid::parse_str(&id).map_err(anyhow::Error::from)?),
        sender,
        receiver,
        content,
        timestamp: timestamp::parse(&created_at).map_err(anyhow::Error::from)?,
    })
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, mut message: Message) -> AppResult<Message> {
        let id = message.id.unwrap_or_else(Uuid::now_v7);
        let created_at = timestamp::format(message.timestamp).map_err(anyhow::Error::from)?;

        sqlx::query("INSERT INTO messages (id,sender,receiver,content,created_at) VALUES (?,?,?,?,?)")
            .bind(id.to_string())
            .bind(&message.sender)
            .bind(&message.receiver)
            .bind(&message.content)
            .bind(created_at)
            .execute(&self.db_pool)
            .await?;

        message.id = Some(id);
        Ok(message)
    }

    async fn history(&self, a: &str, b: &str) -> AppResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,sender,receiver,content,created_at FROM messages
             WHERE (sender=? AND receiver=?) OR (sender=? AND receiver=?)
             ORDER BY created_at, rowid",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn counterparts(&self, identity: &str) -> AppResult<Vec<ConversationSummary>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT counterpart, MAX(created_at) AS last_at FROM (
                SELECT receiver AS counterpart, created_at FROM messages WHERE sender=?
                UNION ALL
                SELECT sender AS counterpart, created_at FROM messages WHERE receiver=?
             )
             GROUP BY counterpart
             ORDER BY last_at DESC",
        )
        .bind(identity)
        .bind(identity)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(counterpart, last_at)| {
                Ok(ConversationSummary {
                    counterpart,
                    last_message_at: timestamp::parse(&last_at).map_err(anyhow::Error::from)?,
                })
            })
            .collect::<Result<_, AppError>>()
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;

    async fn store() -> SqliteMessageStore {
        let db_pool = crate::db::connect("sqlite::memory:").await.unwrap();
        SqliteMessageStore::new(db_pool)
    }

    #[tokio::test]
    async fn append_assigns_an_id() {
        let store = store().await;
        let stored = store
            .append(Message::new("a", "b", "hello", datetime!(2025-01-01 00:00 UTC)))
            .await
            .unwrap();
        assert!(stored.id.is_some());
        assert_eq!(stored.content, "hello");
    }

    #[tokio::test]
    async fn history_covers_both_directions_in_time_order() {
        let store = store().await;
        let t0 = datetime!(2025-01-01 00:00 UTC);
        // inserted out of order on purpose
        store.append(Message::new("b", "a", "second", t0 + Duration::seconds(2))).await.unwrap();
        store.append(Message::new("a", "b", "first", t0)).await.unwrap();
        store.append(Message::new("a", "b", "third", t0 + Duration::seconds(3))).await.unwrap();
        store.append(Message::new("a", "c", "elsewhere", t0 + Duration::seconds(1))).await.unwrap();

        let forward: Vec<String> = store.history("a", "b").await.unwrap().into_iter().map(|m| m.content).collect();
        let backward: Vec<String> = store.history("b", "a").await.unwrap().into_iter().map(|m| m.content).collect();

        assert_eq!(forward, vec!["first", "second", "third"]);
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn identical_messages_are_both_kept() {
        let store = store().await;
        let t0 = datetime!(2025-01-01 00:00 UTC);
        store.append(Message::new("a", "b", "ok", t0)).await.unwrap();
        store.append(Message::new("a", "b", "ok", t0)).await.unwrap();
        assert_eq!(store.history("a", "b").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_of_strangers_is_empty() {
        let store = store().await;
        assert!(store.history("x", "y").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counterparts_are_listed_newest_first() {
        let store = store().await;
        let t0 = datetime!(2025-01-01 00:00 UTC);
        store.append(Message::new("a", "b", "1", t0)).await.unwrap();
        store.append(Message::new("c", "a", "2", t0 + Duration::minutes(5))).await.unwrap();
        store.append(Message::new("b", "a", "3", t0 + Duration::minutes(1))).await.unwrap();

        let summaries = store.counterparts("a").await.unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.counterpart.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert_eq!(summaries[1].last_message_at, t0 + Duration::minutes(1));
    }
}
