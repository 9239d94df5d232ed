pub mod contact_dto;
pub mod contact_handlers;
pub mod routes;

pub use routes::contact_routes;
