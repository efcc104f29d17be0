pub mod conversation;
pub mod message;

pub use conversation::Conversation;
pub use message::{
    EnrichedMessage, MediaAttachment, MediaKind, Message, MessageBody, MessagePayload,
    MessageStatus, ReadReceipt,
};
