use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::AccountProfile;
use crate::error::AppError;

/// Delivery state of a message. Transitions are strictly monotonic:
/// sent -> delivered -> read, never backward. The `Ord` derive encodes
/// that ranking and backs the conditional-update checks in the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Attachment descriptor wrapping an external object-store reference.
/// The service never touches the bytes; `storage_id` is the upload
/// collaborator's handle for the stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
    pub storage_id: String,
    pub name: String,
    #[serde(default)]
    pub size: i64,
}

/// Message content as a closed union: exactly one primary content type per
/// message, with an optional caption on the non-text variants. Exhaustive
/// matching keeps preview logic and wire flattening honest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageBody {
    Text {
        text: String,
    },
    Media {
        kind: MediaKind,
        attachments: Vec<MediaAttachment>,
        #[serde(default)]
        caption: String,
    },
    #[serde(rename = "product-reference")]
    Product {
        product_id: Uuid,
        #[serde(default)]
        caption: String,
    },
    #[serde(rename = "order-reference")]
    Order {
        order_id: Uuid,
        #[serde(default)]
        caption: String,
    },
}

impl MessageBody {
    /// Wire-level type string: text, image, video, product-reference,
    /// order-reference.
    pub fn kind_str(&self) -> &'static str {
        match self {
            MessageBody::Text { .. } => "text",
            MessageBody::Media {
                kind: MediaKind::Image,
                ..
            } => "image",
            MessageBody::Media {
                kind: MediaKind::Video,
                ..
            } => "video",
            MessageBody::Product { .. } => "product-reference",
            MessageBody::Order { .. } => "order-reference",
        }
    }

    /// Listing preview: literal text, else caption, else a type-aware
    /// default line.
    pub fn preview(&self) -> String {
        match self {
            MessageBody::Text { text } => text.clone(),
            MessageBody::Media { kind, caption, .. } => {
                if !caption.is_empty() {
                    caption.clone()
                } else {
                    match kind {
                        MediaKind::Image => "Sent an image".to_string(),
                        MediaKind::Video => "Sent a video".to_string(),
                    }
                }
            }
            MessageBody::Product { caption, .. } => {
                if !caption.is_empty() {
                    caption.clone()
                } else {
                    "Shared a product".to_string()
                }
            }
            MessageBody::Order { caption, .. } => {
                if !caption.is_empty() {
                    caption.clone()
                } else {
                    "Shared an order".to_string()
                }
            }
        }
    }

    pub fn text(&self) -> &str {
        match self {
            MessageBody::Text { text } => text,
            MessageBody::Media { caption, .. }
            | MessageBody::Product { caption, .. }
            | MessageBody::Order { caption, .. } => caption,
        }
    }

    pub fn attachments(&self) -> &[MediaAttachment] {
        match self {
            MessageBody::Media { attachments, .. } => attachments,
            _ => &[],
        }
    }

    /// Validate and fold the flat wire payload into a body. At most one
    /// primary content type may be declared; a text message must carry
    /// non-empty text.
    pub fn from_payload(payload: &MessagePayload) -> Result<Self, AppError> {
        let caption = payload
            .text
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();

        let primaries = [
            !payload.media.is_empty(),
            payload.product_id.is_some(),
            payload.order_id.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();
        if primaries > 1 {
            return Err(AppError::Validation(
                "message declares more than one primary content type".into(),
            ));
        }

        // A declared type must be backed by its primary field.
        match payload.kind.as_deref() {
            Some("product-reference") if payload.product_id.is_none() => {
                return Err(AppError::Validation(
                    "product-reference message requires productId".into(),
                ));
            }
            Some("order-reference") if payload.order_id.is_none() => {
                return Err(AppError::Validation(
                    "order-reference message requires orderId".into(),
                ));
            }
            Some("image") | Some("video") if payload.media.is_empty() => {
                return Err(AppError::Validation(
                    "media message requires at least one attachment".into(),
                ));
            }
            _ => {}
        }

        if let Some(product_id) = payload.product_id {
            return Ok(MessageBody::Product {
                product_id,
                caption,
            });
        }
        if let Some(order_id) = payload.order_id {
            return Ok(MessageBody::Order { order_id, caption });
        }
        if !payload.media.is_empty() {
            let declared_video = payload.kind.as_deref() == Some("video");
            let kind = if declared_video
                || payload
                    .media
                    .first()
                    .is_some_and(|m| m.kind == MediaKind::Video)
            {
                MediaKind::Video
            } else {
                MediaKind::Image
            };
            return Ok(MessageBody::Media {
                kind,
                attachments: payload.media.clone(),
                caption,
            });
        }

        if caption.is_empty() {
            return Err(AppError::Validation(
                "text message requires non-empty text".into(),
            ));
        }
        Ok(MessageBody::Text { text: caption })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub body: MessageBody,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender_id: Uuid, body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            body,
            status: MessageStatus::Sent,
            created_at: Utc::now(),
        }
    }
}

/// Flat inbound send request, shared by the socket `send-message` event and
/// the REST upload-then-send endpoint. IDs arrive as strings and are
/// validated at the boundary; `temp_id` is an opaque client token echoed
/// back in the acknowledgement (never deduplicated server-side).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub product_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub temp_id: Option<String>,
}

/// Outbound message representation: the stored message flattened back to
/// wire shape and enriched with the sender's display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub media: Vec<MediaAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
}

impl EnrichedMessage {
    pub fn from_message(
        message: &Message,
        receiver_id: Uuid,
        sender: Option<&AccountProfile>,
        temp_id: Option<String>,
    ) -> Self {
        let (product_id, order_id) = match &message.body {
            MessageBody::Product { product_id, .. } => (Some(*product_id), None),
            MessageBody::Order { order_id, .. } => (None, Some(*order_id)),
            _ => (None, None),
        };

        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id,
            sender_name: sender
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            sender_avatar: sender.and_then(|p| p.avatar_url.clone()),
            kind: message.body.kind_str().to_string(),
            text: message.body.text().to_string(),
            media: message.body.attachments().to_vec(),
            product_id,
            order_id,
            status: message.status,
            created_at: message.created_at,
            temp_id,
        }
    }
}

/// Read-receipt notification pushed to the original sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub reader_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_payload(text: &str) -> MessagePayload {
        MessagePayload {
            sender_id: Uuid::new_v4().to_string(),
            receiver_id: Uuid::new_v4().to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn attachment(kind: MediaKind) -> MediaAttachment {
        MediaAttachment {
            kind,
            url: "https://cdn.example.com/a.bin".into(),
            storage_id: "obj-1".into(),
            name: "a.bin".into(),
            size: 1024,
        }
    }

    #[test]
    fn status_ordering_is_monotonic() {
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
        assert_eq!(MessageStatus::parse("delivered"), Some(MessageStatus::Delivered));
        assert_eq!(MessageStatus::parse("bogus"), None);
    }

    #[test]
    fn text_body_requires_content() {
        let ok = MessageBody::from_payload(&text_payload("hi")).unwrap();
        assert_eq!(ok, MessageBody::Text { text: "hi".into() });

        let err = MessageBody::from_payload(&text_payload("   ")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn empty_text_is_allowed_with_media() {
        let mut payload = text_payload("");
        payload.media = vec![attachment(MediaKind::Image)];
        let body = MessageBody::from_payload(&payload).unwrap();
        assert_eq!(body.kind_str(), "image");
        assert_eq!(body.attachments().len(), 1);
    }

    #[test]
    fn at_most_one_primary_content_type() {
        let mut payload = text_payload("caption");
        payload.media = vec![attachment(MediaKind::Image)];
        payload.product_id = Some(Uuid::new_v4());
        assert!(MessageBody::from_payload(&payload).is_err());

        let mut payload = text_payload("");
        payload.product_id = Some(Uuid::new_v4());
        payload.order_id = Some(Uuid::new_v4());
        assert!(MessageBody::from_payload(&payload).is_err());
    }

    #[test]
    fn declared_type_must_match_fields() {
        let mut payload = text_payload("look at this");
        payload.kind = Some("product-reference".into());
        assert!(MessageBody::from_payload(&payload).is_err());

        payload.kind = Some("image".into());
        assert!(MessageBody::from_payload(&payload).is_err());
    }

    #[test]
    fn caption_rides_along_any_type() {
        let mut payload = text_payload("the one we discussed");
        payload.product_id = Some(Uuid::new_v4());
        let body = MessageBody::from_payload(&payload).unwrap();
        assert_eq!(body.kind_str(), "product-reference");
        assert_eq!(body.text(), "the one we discussed");
        assert_eq!(body.preview(), "the one we discussed");
    }

    #[test]
    fn previews_are_type_aware() {
        let image = MessageBody::Media {
            kind: MediaKind::Image,
            attachments: vec![attachment(MediaKind::Image)],
            caption: String::new(),
        };
        assert_eq!(image.preview(), "Sent an image");

        let video = MessageBody::Media {
            kind: MediaKind::Video,
            attachments: vec![attachment(MediaKind::Video)],
            caption: String::new(),
        };
        assert_eq!(video.preview(), "Sent a video");

        let order = MessageBody::Order {
            order_id: Uuid::new_v4(),
            caption: String::new(),
        };
        assert_eq!(order.preview(), "Shared an order");
    }

    #[test]
    fn video_kind_inferred_from_attachments() {
        let mut payload = text_payload("");
        payload.media = vec![attachment(MediaKind::Video)];
        let body = MessageBody::from_payload(&payload).unwrap();
        assert_eq!(body.kind_str(), "video");
    }

    #[test]
    fn enriched_message_flattens_body() {
        let message = Message::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MessageBody::Text { text: "hi".into() },
        );
        let enriched = EnrichedMessage::from_message(
            &message,
            Uuid::new_v4(),
            None,
            Some("tmp-1".into()),
        );
        assert_eq!(enriched.sender_name, "Unknown");
        assert_eq!(enriched.kind, "text");
        assert_eq!(enriched.temp_id.as_deref(), Some("tmp-1"));

        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["tempId"], "tmp-1");
        assert!(json.get("productId").is_none());
    }
}
