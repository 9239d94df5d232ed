pub mod composer_dto;
pub mod composer_handlers;
pub mod composer_state;
pub mod routes;

pub use routes::composer_routes;
pub use composer_state::{AttachmentKind, ComposerState, ComposerView};
