use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Chat, Contact};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactSearchRequest {
    pub email: String,
}

/// Result of a contact lookup. `contact` is absent when the search email
/// was blank.
#[derive(Debug, Serialize, ToSchema)]
pub struct ContactSearchResponse {
    pub contact: Option<Contact>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddContactResponse {
    pub message: String,
    pub chat: Chat,
}
