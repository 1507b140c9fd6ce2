use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::auth::OwnerId;
use super::AppState;
use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::service::chat_service::validate_message;
use crate::uploads::{self, PendingFile};

// ── Form input ────────────────────────────────────────────────────────────────

/// Parsed `POST /api/messages` multipart body. Files are validated but not yet stored.
#[derive(Debug, Default)]
pub struct MessageForm {
    pub message: String,
    pub conversation_id: Option<String>,
    pub files: Vec<PendingFile>,
}

fn malformed(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidAttachment { reason: format!("malformed multipart body: {e}") }
}

pub async fn read_message_form(mut multipart: Multipart) -> Result<MessageForm, AppError> {
    let mut form = MessageForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "message" => form.message = field.text().await.map_err(malformed)?,
            "conversationId" => {
                let id = field.text().await.map_err(malformed)?;
                form.conversation_id = Some(id.trim().to_string()).filter(|id| !id.is_empty());
            }
            "files" => {
                uploads::check_file_count(form.files.len() + 1)?;
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                uploads::check_file_type(&original_name, &mime_type)?;

                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    bytes.extend_from_slice(&chunk);
                    uploads::check_file_size(&original_name, bytes.len())?;
                }
                form.files.push(PendingFile { original_name, mime_type, bytes });
            }
            other => debug!("Ignoring multipart field '{other}'"),
        }
    }
    Ok(form)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/messages` - send a message, creating the conversation when no id is given
pub async fn send_message_handler(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_message_form(multipart).await?;
    validate_message(&form.message)?;

    let attachments = state.uploads.store(form.files).await?;
    let request = ChatRequest {
        owner_id,
        conversation_id: form.conversation_id,
        message: form.message,
        attachments: attachments.clone(),
    };

    match state.chat.send_message(request).await {
        Ok(response) => Ok(Json(json!({ "success": true, "data": response }))),
        Err(err) => {
            // Nothing references these files now.
            state.uploads.remove(&attachments).await;
            Err(err)
        }
    }
}

/// GET `/api/conversations` - owner's conversations, most recent first
pub async fn list_conversations_handler(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
) -> Result<Json<Value>, AppError> {
    let summaries = state.chat.list_conversations(&owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "count": summaries.len(),
        "data": summaries,
    })))
}

/// GET `/api/conversations/{id}` - full conversation including messages
pub async fn get_conversation_handler(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let conversation = state.chat.get_conversation(&owner_id, &id).await?;
    Ok(Json(json!({ "success": true, "data": conversation })))
}

/// DELETE `/api/conversations/{id}` - delete the record, then its files best-effort
pub async fn delete_conversation_handler(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.chat.delete_conversation(&owner_id, &id).await?;
    let removed = state.uploads.remove(deleted.attachments()).await;
    info!("Removed {removed} upload(s) of conversation {id}");
    Ok(Json(json!({
        "success": true,
        "message": "Conversation deleted successfully",
    })))
}

/// GET `/api/health`
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
