use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::{AttachmentKind, ComposerView};
use crate::models::Message;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComposerInputRequest {
    pub text: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InsertEmojiRequest {
    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
    /// Character position; the end of the draft when omitted.
    pub cursor: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachmentRequest {
    pub kind: AttachmentKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComposerSendResponse {
    /// The stored message; absent when the draft was blank or no chat is
    /// selected.
    pub message: Option<Message>,
    pub composer: ComposerView,
}
