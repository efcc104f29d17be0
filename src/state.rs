use std::sync::Arc;

use crate::accounts::AccountDirectory;
use crate::config::Config;
use crate::services::{MessageRouter, ReadReceiptTracker, SummaryAggregator, TypingRelay};
use crate::store::ChatStore;
use crate::websocket::SessionRegistry;

/// Shared handles threaded through every HTTP and socket handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub registry: SessionRegistry,
    pub config: Arc<Config>,
    pub router: Arc<MessageRouter>,
    pub receipts: Arc<ReadReceiptTracker>,
    pub typing: Arc<TypingRelay>,
    pub summaries: Arc<SummaryAggregator>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        accounts: Arc<dyn AccountDirectory>,
        config: Config,
    ) -> Self {
        let registry = SessionRegistry::new();
        let router = Arc::new(MessageRouter::new(
            store.clone(),
            accounts.clone(),
            registry.clone(),
        ));
        let receipts = Arc::new(ReadReceiptTracker::new(store.clone(), registry.clone()));
        let typing = Arc::new(TypingRelay::new(registry.clone()));
        let summaries = Arc::new(SummaryAggregator::new(store.clone(), accounts.clone()));

        Self {
            store,
            accounts,
            registry,
            config: Arc::new(config),
            router,
            receipts,
            typing,
            summaries,
        }
    }
}
