pub mod routes;
pub mod settings_dto;
pub mod settings_handlers;

pub use routes::settings_routes;
