use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

// message: unique id
// history lookups filter on (sender, receiver) and sort on created_at
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        sender TEXT NOT NULL,
        receiver TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_pair ON messages (sender, receiver, created_at)",
];

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    // every connection to `:memory:` is its own database, so keep exactly one alive
    let in_memory = database_url.contains(":memory:");
    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(16)
    };

    let db_pool = options
        .connect(database_url)
        .await
        .with_context(|| format!("connecting to {database_url}"))?;

    migrate(&db_pool).await.context("creating message schema")?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}
