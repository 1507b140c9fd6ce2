pub mod api_routes;
pub mod auth;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use self::api_routes::{
    delete_conversation_handler, fallback_handler, get_conversation_handler, health_handler,
    list_conversations_handler, send_message_handler,
};
use self::auth::{require_owner, OwnerResolver};
use crate::service::ChatService;
use crate::uploads::{UploadStore, MAX_FILES, MAX_FILE_SIZE};

/// Room for the text fields and multipart framing on top of the file payload.
const FORM_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub uploads: UploadStore,
    pub auth: Arc<dyn OwnerResolver>,
}

/// Builds the `/api` router. CORS is layered on by the binary.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/messages",
            post(send_message_handler)
                .layer(DefaultBodyLimit::max(MAX_FILES * MAX_FILE_SIZE + FORM_OVERHEAD)),
        )
        .route("/conversations", get(list_conversations_handler))
        .route(
            "/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            require_owner,
        ));

    let api = Router::new()
        .route("/health", get(health_handler))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
