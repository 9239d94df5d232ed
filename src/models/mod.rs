pub mod chat;
pub mod identity;
pub mod message;
pub mod user;

pub use chat::{Chat, ChatParticipant, ChatType, NewChat, NewChatParticipant};
pub use identity::{AuthEvent, Identity, Session};
pub use message::{Message, NewMessage, DEFAULT_MESSAGE_TYPE};
pub use user::{Contact, NewUser, UserStatus};
