//! Chat domain services, wired once at startup and shared through
//! [`crate::state::AppState`].

use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod receipts;
pub mod router;
pub mod summary;
pub mod typing;

pub use receipts::ReadReceiptTracker;
pub use router::{MessageRouter, SendOutcome};
pub use summary::{ConversationSummary, SummaryAggregator};
pub use typing::TypingRelay;

/// Parse an account ID arriving as a wire string. Nil UUIDs are rejected
/// alongside garbage; they are never valid account identities.
pub fn parse_account_id(raw: &str, field: &str) -> AppResult<Uuid> {
    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation(format!("{field} is not a valid account id")))?;
    if id.is_nil() {
        return Err(AppError::Validation(format!(
            "{field} is not a valid account id"
        )));
    }
    Ok(id)
}
