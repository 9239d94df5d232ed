use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    composer::ComposerView,
    models::{Chat, ChatType, Message, DEFAULT_MESSAGE_TYPE},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateChatRequest {
    #[validate(length(min = 1))]
    pub participant_ids: Vec<Uuid>,
    #[validate(length(max = 255))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    DEFAULT_MESSAGE_TYPE.to_string()
}

/// One row of the conversation list.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatSummary {
    pub id: Uuid,
    pub chat_type: ChatType,
    pub title: String,
    pub preview: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl ChatSummary {
    pub fn new(chat: &Chat, active: Option<Uuid>) -> Self {
        Self {
            id: chat.id,
            chat_type: chat.chat_type,
            title: chat.display_name().to_string(),
            preview: chat
                .last_message
                .clone()
                .unwrap_or_else(|| "No messages yet".to_string()),
            last_message_at: chat.last_message_at,
            active: active == Some(chat.id),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageView {
    pub message: Message,
    /// Sent by the signed-in user.
    pub own: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadResponse {
    pub chat: Option<Chat>,
    pub messages: Vec<MessageView>,
    pub composer: ComposerView,
}

impl ThreadResponse {
    pub fn new(chat: Option<Chat>, messages: Vec<Message>, viewer: Uuid, composer: ComposerView) -> Self {
        Self {
            chat,
            messages: messages
                .into_iter()
                .map(|message| MessageView {
                    own: message.is_from(viewer),
                    message,
                })
                .collect(),
            composer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_placeholders() {
        let chat = Chat {
            id: Uuid::new_v4(),
            chat_type: ChatType::Direct,
            name: None,
            created_at: Utc::now(),
            last_message: None,
            last_message_at: None,
        };

        let summary = ChatSummary::new(&chat, Some(chat.id));
        assert_eq!(summary.title, "Chat");
        assert_eq!(summary.preview, "No messages yet");
        assert!(summary.active);
    }

    #[test]
    fn test_send_request_defaults_to_text() {
        let request: SendMessageRequest =
            serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(request.message_type, "text");
    }
}
