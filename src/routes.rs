use crate::{
    backend::OAuthProvider,
    composer::{self, composer_dto::*, composer_routes, AttachmentKind, ComposerView},
    contact::{self, contact_dto::*, contact_routes},
    context::Preferences,
    conversation::{self, conversation_dto::*, conversation_routes},
    middleware::auth_middleware,
    models::{identity::UserMetadata, *},
    navigation::{self, Action, NavigateResponse, Route},
    session::{self, protected_session_routes, public_session_routes, session_dto::*},
    settings::{self, settings_dto::*, settings_routes},
    state::AppState,
};
use axum::{middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        session::session_handlers::login,
        session::session_handlers::register,
        session::session_handlers::reset_password,
        session::session_handlers::oauth_sign_in,
        session::session_handlers::logout,
        session::session_handlers::get_session,
        session::session_handlers::session_events,
        navigation::navigate,
        conversation::conversation_handlers::list_chats,
        conversation::conversation_handlers::create_chat,
        conversation::conversation_handlers::select_chat,
        conversation::conversation_handlers::get_thread,
        conversation::conversation_handlers::reload_thread,
        conversation::conversation_handlers::send_message,
        composer::composer_handlers::update_draft,
        composer::composer_handlers::insert_emoji,
        composer::composer_handlers::toggle_emoji_picker,
        composer::composer_handlers::toggle_attach_menu,
        composer::composer_handlers::choose_attachment,
        composer::composer_handlers::send_draft,
        contact::contact_handlers::search_contact,
        contact::contact_handlers::add_contact,
        settings::settings_handlers::get_settings,
        settings::settings_handlers::change_password,
        settings::settings_handlers::update_preferences,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            ResetPasswordRequest,
            AuthResponse,
            MessageResponse,
            Identity,
            UserMetadata,
            OAuthProvider,
            NavigateResponse,
            Action,
            Route,
            CreateChatRequest,
            SendMessageRequest,
            ChatSummary,
            ChatListResponse,
            MessageView,
            ThreadResponse,
            Chat,
            ChatType,
            Message,
            ComposerInputRequest,
            InsertEmojiRequest,
            AttachmentRequest,
            AttachmentKind,
            ComposerView,
            ComposerSendResponse,
            ContactSearchRequest,
            ContactSearchResponse,
            AddContactResponse,
            Contact,
            SettingsResponse,
            ChangePasswordRequest,
            UpdatePreferencesRequest,
            Preferences,
        )
    ),
    tags(
        (name = "auth", description = "Session endpoints"),
        (name = "navigation", description = "Page resolution"),
        (name = "chats", description = "Conversation list and thread"),
        (name = "composer", description = "Message composer"),
        (name = "contacts", description = "Contact search"),
        (name = "settings", description = "Account settings")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no client context required)
    let public_routes = Router::new()
        .nest("/auth", public_session_routes())
        .route("/navigate", get(navigation::navigate));

    // Protected routes (signed-in client context required)
    let protected_routes = Router::new()
        .merge(protected_session_routes())
        .merge(conversation_routes())
        .merge(composer_routes())
        .merge(contact_routes())
        .merge(settings_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::MemoryService,
        context::MAX_CONTEXTS_PER_USER,
        state::{BackendMode, Config},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config {
            backend: BackendMode::Memory {
                jwt_secret: "test-secret".to_string(),
            },
            app_origin: "http://localhost:5173".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let connector = Arc::new(MemoryService::with_cost("test-secret", 4));
        create_router(AppState::with_connector(config, connector))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str, name: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "password123", "full_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let app = app();

        let (status, body) = call(&app, Method::GET, "/api/chats", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, Method::GET, "/api/session", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_direct_chat_hello_flow() {
        let app = app();
        let (alice, alice_id) = register(&app, "alice@example.com", "Alice").await;
        let (_bob, bob_id) = register(&app, "bob@example.com", "Bob").await;

        let (status, chat) = call(
            &app,
            Method::POST,
            "/api/chats",
            Some(&alice),
            Some(json!({ "participant_ids": [bob_id] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(chat["type"], "direct");
        let chat_id = chat["id"].as_str().unwrap().to_string();

        let (status, list) = call(&app, Method::GET, "/api/chats", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["chats"].as_array().unwrap().len(), 1);

        let uri = format!("/api/chats/{}/select", chat_id);
        let (status, thread) = call(&app, Method::POST, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(thread["messages"].as_array().unwrap().is_empty());

        let (status, composer) = call(
            &app,
            Method::PUT,
            "/api/composer",
            Some(&alice),
            Some(json!({ "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(composer["is_typing"], true);

        let (status, sent) = call(&app, Method::POST, "/api/composer/send", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sent["message"]["content"], "hello");
        assert_eq!(sent["composer"]["text"], "");

        let (status, thread) = call(&app, Method::POST, "/api/thread/reload", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let messages = thread["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["message"]["content"], "hello");
        assert_eq!(messages[0]["message"]["sender_id"], alice_id.as_str());
        assert_eq!(messages[0]["own"], true);
    }

    #[tokio::test]
    async fn test_reload_without_selection() {
        let app = app();
        let (alice, _) = register(&app, "alice@example.com", "Alice").await;

        let (status, body) = call(&app, Method::POST, "/api/thread/reload", Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No chat selected");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/messages",
            Some(&alice),
            Some(json!({ "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_contact_search_and_add() {
        let app = app();
        let (alice, _) = register(&app, "alice@example.com", "Alice").await;
        let (_bob, bob_id) = register(&app, "bob@example.com", "Bob").await;

        let (status, _) = call(&app, Method::POST, "/api/contacts/add", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/contacts/search",
            Some(&alice),
            Some(json!({ "email": "  carol@example.com " })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/contacts/search",
            Some(&alice),
            Some(json!({ "email": " bob@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contact"]["id"], bob_id.as_str());

        let (status, body) = call(&app, Method::POST, "/api/contacts/add", Some(&alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Chat created successfully");
        assert_eq!(body["chat"]["type"], "direct");
    }

    #[tokio::test]
    async fn test_password_mismatch_and_update() {
        let app = app();
        let (alice, _) = register(&app, "alice@example.com", "Alice").await;

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/settings/password",
            Some(&alice),
            Some(json!({
                "current_password": "password123",
                "new_password": "new-password",
                "confirm_password": "other-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "New passwords do not match");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/settings/password",
            Some(&alice),
            Some(json!({
                "current_password": "password123",
                "new_password": "new-password",
                "confirm_password": "new-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password updated successfully");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "new-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oldest_token_is_dropped_after_repeated_logins() {
        let app = app();
        let (first, _) = register(&app, "alice@example.com", "Alice").await;

        let mut latest = String::new();
        for _ in 0..MAX_CONTEXTS_PER_USER {
            let (status, body) = call(
                &app,
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "alice@example.com", "password": "password123" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            latest = body["token"].as_str().unwrap().to_string();
        }

        let (status, _) = call(&app, Method::GET, "/api/session", Some(&first), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/api/session", Some(&latest), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_settings_preferences() {
        let app = app();
        let (alice, _) = register(&app, "alice@example.com", "Alice").await;

        let (status, body) = call(
            &app,
            Method::PATCH,
            "/api/settings/preferences",
            Some(&alice),
            Some(json!({ "dark_mode": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["dark_mode"], true);
        assert_eq!(body["notifications"], true);
    }

    #[tokio::test]
    async fn test_navigation_and_logout() {
        let app = app();
        let (alice, _) = register(&app, "alice@example.com", "Alice").await;

        let (status, body) = call(&app, Method::GET, "/api/navigate?path=/login", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "redirect");
        assert_eq!(body["location"], "/chat");

        let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, Method::GET, "/api/navigate?path=/chat", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location"], "/login");

        let (status, _) = call(&app, Method::GET, "/api/navigate?path=/admin", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
