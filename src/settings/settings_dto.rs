use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub email: Option<String>,
    pub notifications: bool,
    pub dark_mode: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    /// Collected by the form but not checked; the signed-in session is
    /// enough for the backend to accept the update.
    #[serde(default)]
    pub current_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
    pub confirm_password: String,
}

impl ChangePasswordRequest {
    /// The new password, once its confirmation matches.
    pub fn confirmed(&self) -> Result<&str> {
        if self.new_password != self.confirm_password {
            return Err(AppError::Validation("New passwords do not match".to_string()));
        }
        Ok(&self.new_password)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    pub notifications: Option<bool>,
    pub dark_mode: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(new_password: &str, confirm_password: &str) -> ChangePasswordRequest {
        ChangePasswordRequest {
            current_password: "old-password".to_string(),
            new_password: new_password.to_string(),
            confirm_password: confirm_password.to_string(),
        }
    }

    #[test]
    fn test_mismatched_confirmation_is_rejected() {
        let mismatched = request("new-password", "new-passw0rd");
        let result = mismatched.confirmed();
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "New passwords do not match"));
    }

    #[test]
    fn test_matching_confirmation() {
        let matching = request("new-password", "new-password");
        assert_eq!(matching.confirmed().unwrap(), "new-password");
    }
}
