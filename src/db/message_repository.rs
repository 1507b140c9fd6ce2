use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use tracing::error;

use crate::errors::AppError;
use crate::models::{Attachment, Message, MessageRole};

/// Rows of the `messages` table. Insertion order is kept by the `seq` column.
#[derive(Clone, Default)]
pub struct MessageRepository;

impl MessageRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_conversation_id(
        &self,
        conn: &mut PgConnection,
        conversation_id: &str,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(
            "SELECT id, role, content, attachments, created_at
             FROM messages
             WHERE conversation_id = $1
             ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(conn)
        .await
        .map_err(|e| {
            error!("Failed to fetch messages for conversation {conversation_id}: {e}");
            AppError::db_query(
                format!("Failed to fetch messages for conversation {conversation_id}"),
                e,
            )
        })?;

        rows.into_iter()
            .map(|row: sqlx::postgres::PgRow| {
                let role_str: String = row.try_get("role")
                    .map_err(|e| AppError::db_query("Failed to read role", e))?;
                let role = MessageRole::try_from(role_str)
                    .map_err(|e| AppError::Unexpected(format!("Unknown message role: {e}")))?;
                let Json(attachments): Json<Vec<Attachment>> = row.try_get("attachments")
                    .map_err(|e| AppError::db_query("Failed to read attachments", e))?;
                Ok(Message {
                    id: row.try_get("id")
                        .map_err(|e| AppError::db_query("Failed to read id", e))?,
                    role,
                    content: row.try_get("content")
                        .map_err(|e| AppError::db_query("Failed to read content", e))?,
                    attachments,
                    timestamp: row.try_get("created_at")
                        .map_err(|e| AppError::db_query("Failed to read created_at", e))?,
                })
            })
            .collect()
    }

    pub async fn first_content(
        &self,
        conn: &mut PgConnection,
        conversation_id: &str,
    ) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT content FROM messages WHERE conversation_id = $1 ORDER BY seq ASC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            error!("Failed to read first message of conversation {conversation_id}: {e}");
            AppError::db_query("Failed to read first message", e)
        })
    }

    pub async fn save(
        &self,
        conn: &mut PgConnection,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, attachments, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&message.id)
        .bind(conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(Json(&message.attachments))
        .bind(message.timestamp)
        .execute(conn)
        .await
        .map_err(|e| {
            error!("Failed to save message {}: {e}", message.id);
            AppError::db_query("Failed to save message", e)
        })?;
        Ok(())
    }
}
