pub mod routes;
pub mod session_dto;
pub mod session_handlers;
pub mod session_store;

pub use routes::{protected_session_routes, public_session_routes};
pub use session_store::SessionStore;
