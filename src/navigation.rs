//! Page routing of the browser app, resolved against the caller's
//! authentication state.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, Result},
    middleware::bearer_token,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Register,
    ResetPassword,
    Chat,
    Settings,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::ResetPassword => "/reset-password",
            Route::Chat => "/chat",
            Route::Settings => "/chat/settings",
        }
    }

    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/reset-password" => Some(Route::ResetPassword),
            "/chat" => Some(Route::Chat),
            "/chat/settings" => Some(Route::Settings),
            _ => None,
        }
    }

    fn requires_identity(&self) -> bool {
        matches!(self, Route::Chat | Route::Settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Render,
    Redirect,
}

/// Where a browser landing on `path` ends up. Unknown paths are `None`.
pub fn resolve(path: &str, authenticated: bool) -> Option<Navigation> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    if path == "/" {
        let target = if authenticated { Route::Chat } else { Route::Login };
        return Some(Navigation::Redirect(target));
    }

    let route = Route::from_path(path)?;
    let navigation = match (route.requires_identity(), authenticated) {
        (true, false) => Navigation::Redirect(Route::Login),
        (false, true) => Navigation::Redirect(Route::Chat),
        _ => Navigation::Render(route),
    };
    Some(navigation)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NavigateQuery {
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NavigateResponse {
    pub action: Action,
    pub route: Route,
    pub location: String,
}

impl From<Navigation> for NavigateResponse {
    fn from(navigation: Navigation) -> Self {
        let (action, route) = match navigation {
            Navigation::Render(route) => (Action::Render, route),
            Navigation::Redirect(route) => (Action::Redirect, route),
        };
        Self {
            action,
            route,
            location: route.path().to_string(),
        }
    }
}

/// Resolve a page path for the calling browser
#[utoipa::path(
    get,
    path = "/api/navigate",
    tag = "navigation",
    params(NavigateQuery),
    responses(
        (status = 200, description = "Page to render or redirect target", body = NavigateResponse),
        (status = 404, description = "Unknown page")
    )
)]
pub async fn navigate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NavigateQuery>,
) -> Result<Json<NavigateResponse>> {
    let authenticated = match bearer_token(&headers).and_then(|token| state.clients.get(token)) {
        Some(context) => context.session.identity().await.is_some(),
        None => false,
    };

    let navigation = resolve(&query.path, authenticated)
        .ok_or_else(|| AppError::NotFound(format!("No page at {}", query.path)))?;

    Ok(Json(navigation.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_redirects_by_auth_state() {
        assert_eq!(resolve("/", true), Some(Navigation::Redirect(Route::Chat)));
        assert_eq!(resolve("/", false), Some(Navigation::Redirect(Route::Login)));
    }

    #[test]
    fn test_chat_pages_need_identity() {
        assert_eq!(resolve("/chat", false), Some(Navigation::Redirect(Route::Login)));
        assert_eq!(
            resolve("/chat/settings", false),
            Some(Navigation::Redirect(Route::Login))
        );
        assert_eq!(
            resolve("/chat/settings/", true),
            Some(Navigation::Render(Route::Settings))
        );
    }

    #[test]
    fn test_auth_pages_send_signed_in_users_to_chat() {
        for path in ["/login", "/register", "/reset-password"] {
            assert_eq!(resolve(path, true), Some(Navigation::Redirect(Route::Chat)));
        }
        assert_eq!(
            resolve("/reset-password", false),
            Some(Navigation::Render(Route::ResetPassword))
        );
    }

    #[test]
    fn test_unknown_path() {
        assert_eq!(resolve("/admin", true), None);
        assert_eq!(resolve("/chat/other", true), None);
    }

    #[test]
    fn test_navigation_serializes_with_action() {
        let response: NavigateResponse = Navigation::Redirect(Route::Login).into();
        let json = serde_json::to_value(response).unwrap();

        assert_eq!(json["action"], "redirect");
        assert_eq!(json["route"], "login");
        assert_eq!(json["location"], "/login");
    }
}
