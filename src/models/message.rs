use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_MESSAGE_TYPE: &str = "text";

/// Row of the `messages` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub created_at: DateTime<Utc>,
    pub read_by: Vec<Uuid>,
}

impl Message {
    pub fn is_from(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub read_by: Vec<Uuid>,
}

impl NewMessage {
    /// The sender is the only initial reader.
    pub fn new(chat_id: Uuid, sender_id: Uuid, content: &str, message_type: &str) -> Self {
        Self {
            chat_id,
            sender_id,
            content: content.to_string(),
            message_type: message_type.to_string(),
            read_by: vec![sender_id],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_seeds_reader_with_sender() {
        let sender = Uuid::new_v4();
        let message = NewMessage::new(Uuid::new_v4(), sender, "hi", DEFAULT_MESSAGE_TYPE);

        assert_eq!(message.read_by, vec![sender]);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "text");
    }
}
