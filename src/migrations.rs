use sqlx::{Executor, Pool, Postgres};

// Schema files ship inside the binary; ordering is the array below.
const MIG_0001: &str = include_str!("../migrations/0001_create_accounts.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_conversations.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_messages.sql");

/// Apply the schema at boot. Everything is IF NOT EXISTS, so rerunning
/// against an up-to-date database is harmless.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003].into_iter().enumerate() {
        let label = i + 1;
        // Raw execute: a file can hold several statements, which prepared
        // queries would reject.
        match db.execute(sql).await {
            Ok(_) => tracing::info!(migration = %label, "schema migration applied"),
            Err(e) => {
                tracing::warn!(migration = %label, error = %e, "migration skipped, likely already applied");
            }
        }
    }
    Ok(())
}
