use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::conversation_dto::{
    ChatListResponse, ChatSummary, CreateChatRequest, SendMessageRequest, ThreadResponse,
};
use crate::{
    error::{AppError, Result},
    middleware::AuthClient,
};

pub async fn thread_view(client: &AuthClient) -> ThreadResponse {
    let state = client.context.conversations.snapshot().await;
    let composer = client.context.composer.lock().await.view();

    ThreadResponse::new(state.active_chat, state.messages, client.identity.id, composer)
}

/// Reload and list the user's conversations
#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "chats",
    responses(
        (status = 200, description = "Conversations, most recent first", body = ChatListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_chats(client: AuthClient) -> Result<impl IntoResponse> {
    let store = &client.context.conversations;
    store.load_chats().await?;

    let state = store.snapshot().await;
    let active = state.active_chat.as_ref().map(|chat| chat.id);
    let chats = state
        .chats
        .iter()
        .map(|chat| ChatSummary::new(chat, active))
        .collect();

    Ok(Json(ChatListResponse { chats }))
}

/// Start a conversation with one or more users
#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = Chat),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_chat(
    client: AuthClient,
    Json(payload): Json<CreateChatRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let chat = client
        .context
        .conversations
        .create_chat(&payload.participant_ids, payload.name.as_deref())
        .await?
        .ok_or(AppError::Unauthorized("Not signed in".to_string()))?;

    Ok((StatusCode::CREATED, Json(chat)))
}

/// Make a chat active and load its messages
#[utoipa::path(
    post,
    path = "/api/chats/{id}/select",
    tag = "chats",
    params(
        ("id" = Uuid, Path, description = "Chat id from the conversation list")
    ),
    responses(
        (status = 200, description = "Thread of the selected chat", body = ThreadResponse),
        (status = 404, description = "Chat not in the conversation list"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn select_chat(client: AuthClient, Path(chat_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let store = &client.context.conversations;
    let chat = store
        .chats()
        .await
        .into_iter()
        .find(|chat| chat.id == chat_id)
        .ok_or(AppError::NotFound("Chat not found".to_string()))?;

    store.set_active_chat(chat).await;
    store.load_messages(chat_id).await?;

    Ok(Json(thread_view(&client).await))
}

/// Current thread as last loaded
#[utoipa::path(
    get,
    path = "/api/thread",
    tag = "chats",
    responses(
        (status = 200, description = "Active chat, loaded messages and composer", body = ThreadResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_thread(client: AuthClient) -> Json<ThreadResponse> {
    Json(thread_view(&client).await)
}

/// Reload the active chat's messages
#[utoipa::path(
    post,
    path = "/api/thread/reload",
    tag = "chats",
    responses(
        (status = 200, description = "Reloaded thread", body = ThreadResponse),
        (status = 404, description = "No chat selected"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reload_thread(client: AuthClient) -> Result<impl IntoResponse> {
    let store = &client.context.conversations;
    let chat = store
        .active_chat()
        .await
        .ok_or(AppError::NotFound("No chat selected".to_string()))?;

    store.load_messages(chat.id).await?;

    Ok(Json(thread_view(&client).await))
}

/// Send a message to the active chat
#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "chats",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = Message),
        (status = 204, description = "No chat selected, nothing sent"),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_message(
    client: AuthClient,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let sent = client
        .context
        .conversations
        .send_message(&payload.content, &payload.message_type)
        .await?;

    Ok(match sent {
        Some(message) => (StatusCode::CREATED, Json(message)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
