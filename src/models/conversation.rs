use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent record of a two-party messaging relationship.
///
/// Participants are held in canonical order (`participant_a < participant_b`)
/// so lookups match regardless of which side initiated the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Canonical storage order for an unordered participant pair.
    pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn new(a: Uuid, b: Uuid) -> Self {
        let (participant_a, participant_b) = Self::canonical_pair(a, b);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            participant_a,
            participant_b,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, account_id: Uuid) -> bool {
        self.participant_a == account_id || self.participant_b == account_id
    }

    /// The other party, or `None` when the account is not a participant.
    pub fn partner_of(&self, account_id: Uuid) -> Option<Uuid> {
        if self.participant_a == account_id {
            Some(self.participant_b)
        } else if self.participant_b == account_id {
            Some(self.participant_a)
        } else {
            None
        }
    }
}
