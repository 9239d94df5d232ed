pub mod conversation_dto;
pub mod conversation_handlers;
pub mod conversation_store;
pub mod routes;

pub use conversation_store::ConversationStore;
pub use routes::conversation_routes;
