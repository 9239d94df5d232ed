use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
}

impl ChatType {
    /// A chat with more than one other participant is a group.
    pub fn for_participants(others: usize) -> Self {
        if others > 1 {
            ChatType::Group
        } else {
            ChatType::Direct
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatType::Direct => write!(f, "direct"),
            ChatType::Group => write!(f, "group"),
        }
    }
}

/// Row of the `chats` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Chat {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Chat")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChat {
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub name: Option<String>,
}

/// Row of the `chat_participants` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatParticipant {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChatParticipant {
    pub chat_id: Uuid,
    pub user_id: Uuid,
}
