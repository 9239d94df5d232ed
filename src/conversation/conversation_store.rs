use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    backend::{Backend, Direction, Query, Table},
    error::{AppError, Result},
    models::{Chat, ChatParticipant, ChatType, Contact, Message, NewChat, NewChatParticipant, NewMessage},
};

#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct ConversationState {
    pub chats: Vec<Chat>,
    pub active_chat: Option<Chat>,
    pub messages: Vec<Message>,
    pub loading: bool,
}

/// Chat list, active chat and loaded thread of one client. The backend is
/// the source of truth; every load replaces local state wholesale.
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn Backend>,
    state: Arc<RwLock<ConversationState>>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(ConversationState::default())),
        }
    }

    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    pub async fn chats(&self) -> Vec<Chat> {
        self.state.read().await.chats.clone()
    }

    pub async fn active_chat(&self) -> Option<Chat> {
        self.state.read().await.active_chat.clone()
    }

    async fn current_user(&self) -> Result<Option<Uuid>> {
        Ok(self.backend.get_session().await?.map(|session| session.user.id))
    }

    /// Every chat the backend lets the current user see, most recent
    /// activity first. Without a signed-in user nothing changes.
    pub async fn load_chats(&self) -> Result<()> {
        if self.current_user().await?.is_none() {
            return Ok(());
        }

        self.state.write().await.loading = true;
        let query = Query::from(Table::Chats).order("last_message_at", Direction::Descending);
        let result = self.backend.fetch_all::<Chat>(&query).await;

        let mut state = self.state.write().await;
        state.loading = false;
        state.chats = result?;
        tracing::debug!(count = state.chats.len(), "chats loaded");
        Ok(())
    }

    pub async fn set_active_chat(&self, chat: Chat) {
        self.state.write().await.active_chat = Some(chat);
    }

    /// Replaces the message list with the chat's full history, oldest first.
    /// A response that arrives after the user switched chats still wins.
    pub async fn load_messages(&self, chat_id: Uuid) -> Result<()> {
        self.state.write().await.loading = true;
        let query = Query::from(Table::Messages)
            .eq("chat_id", chat_id.to_string())
            .order("created_at", Direction::Ascending);
        let result = self.backend.fetch_all::<Message>(&query).await;

        let mut state = self.state.write().await;
        state.loading = false;
        state.messages = result?;
        tracing::debug!(%chat_id, count = state.messages.len(), "messages loaded");
        Ok(())
    }

    /// Inserts a message into the active chat. Local state is left alone;
    /// the message shows up on the next explicit reload. Returns `None`
    /// without calling the backend when no chat is active or nobody is
    /// signed in.
    pub async fn send_message(&self, content: &str, message_type: &str) -> Result<Option<Message>> {
        let Some(chat) = self.active_chat().await else {
            return Ok(None);
        };
        let Some(sender_id) = self.current_user().await? else {
            return Ok(None);
        };

        let message = NewMessage::new(chat.id, sender_id, content, message_type);
        let stored: Message = self.backend.insert_one(Table::Messages, &message).await?;

        tracing::debug!(chat_id = %chat.id, message_id = %stored.id, "message sent");
        Ok(Some(stored))
    }

    /// Creates a chat with the given users plus the current user and reloads
    /// the chat list. Repeated ids and the creator's own id are ignored.
    ///
    /// The chat row and its participant rows are two separate inserts; if
    /// the second fails the chat row stays behind.
    pub async fn create_chat(&self, participant_ids: &[Uuid], name: Option<&str>) -> Result<Option<Chat>> {
        let Some(creator) = self.current_user().await? else {
            return Ok(None);
        };

        let mut others: Vec<Uuid> = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            if *id != creator && !others.contains(id) {
                others.push(*id);
            }
        }
        if others.is_empty() {
            return Err(AppError::Validation(
                "A chat needs at least one other participant".to_string(),
            ));
        }

        let new_chat = NewChat {
            chat_type: ChatType::for_participants(others.len()),
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        };
        let chat: Chat = self.backend.insert_one(Table::Chats, &new_chat).await?;

        let participants: Vec<NewChatParticipant> = others
            .iter()
            .chain(std::iter::once(&creator))
            .map(|user_id| NewChatParticipant {
                chat_id: chat.id,
                user_id: *user_id,
            })
            .collect();
        if let Err(e) = self
            .backend
            .insert_rows::<_, ChatParticipant>(Table::ChatParticipants, &participants)
            .await
        {
            tracing::error!(chat_id = %chat.id, "participant insert failed, chat left without members: {}", e);
            return Err(e);
        }

        tracing::info!(chat_id = %chat.id, chat_type = %chat.chat_type, members = participants.len(), "chat created");
        self.load_chats().await?;

        Ok(Some(chat))
    }

    /// Looks a user up by exact email. Blank input makes no request.
    pub async fn search_contact(&self, email: &str) -> Result<Option<Contact>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }

        let query = Query::from(Table::Users)
            .select(Contact::COLUMNS)
            .eq("email", email);

        match self.backend.fetch_one::<Contact>(&query).await {
            Ok(contact) => Ok(Some(contact)),
            Err(AppError::NotFound(_)) => Err(AppError::NotFound("User not found".to_string())),
            Err(e) => Err(e),
        }
    }
}
