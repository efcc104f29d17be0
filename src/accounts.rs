//! External account-subsystem collaborator: the chat core only ever needs
//! lookup-by-ID for display enrichment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn lookup(&self, account_id: Uuid) -> AppResult<Option<AccountProfile>>;
}

pub struct PgAccountDirectory {
    db: Pool<Postgres>,
}

impl PgAccountDirectory {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn lookup(&self, account_id: Uuid) -> AppResult<Option<AccountProfile>> {
        let row = sqlx::query("SELECT id, display_name, avatar_url FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| AccountProfile {
            id: r.get("id"),
            display_name: r.get("display_name"),
            avatar_url: r.get("avatar_url"),
        }))
    }
}

/// In-memory directory for tests and local development.
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    profiles: RwLock<HashMap<Uuid, AccountProfile>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: AccountProfile) {
        self.profiles
            .write()
            .expect("account directory lock poisoned")
            .insert(profile.id, profile);
    }

    pub fn register(&self, id: Uuid, display_name: &str, avatar_url: Option<&str>) {
        self.insert(AccountProfile {
            id,
            display_name: display_name.to_string(),
            avatar_url: avatar_url.map(|s| s.to_string()),
        });
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn lookup(&self, account_id: Uuid) -> AppResult<Option<AccountProfile>> {
        Ok(self
            .profiles
            .read()
            .expect("account directory lock poisoned")
            .get(&account_id)
            .cloned())
    }
}
