use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::error;

use crate::errors::AppError;
use crate::models::{Conversation, ConversationSummary, Message};

/// A `conversations` row without its messages.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRow {
    pub fn with_messages(self, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            messages,
            model_id: self.model_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_summaries(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        sqlx::query_as::<_, ConversationSummary>(
            "SELECT id, title, created_at, updated_at FROM conversations
             WHERE owner_id = $1
             ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch conversations for owner {owner_id}: {e}");
            AppError::db_query("Failed to fetch conversations", e)
        })
    }

    pub async fn find_for_owner(
        &self,
        conn: &mut PgConnection,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<ConversationRow>, AppError> {
        sqlx::query_as::<_, ConversationRow>(
            "SELECT id, owner_id, title, model_id, created_at, updated_at
             FROM conversations
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            error!("Failed to find conversation {id}: {e}");
            AppError::db_query(format!("Failed to find conversation {id}"), e)
        })
    }

    pub async fn save(
        &self,
        conn: &mut PgConnection,
        conversation: &Conversation,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO conversations (id, owner_id, title, model_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&conversation.id)
        .bind(&conversation.owner_id)
        .bind(&conversation.title)
        .bind(&conversation.model_id)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(conn)
        .await
        .map_err(|e| {
            error!("Failed to save conversation {}: {e}", conversation.id);
            AppError::db_query("Failed to save conversation", e)
        })?;
        Ok(())
    }

    /// Reads the current title, locking the row for the rest of the transaction.
    pub async fn lock_title(
        &self,
        conn: &mut PgConnection,
        id: &str,
    ) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT title FROM conversations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            error!("Failed to lock conversation {id}: {e}");
            AppError::db_query(format!("Failed to lock conversation {id}"), e)
        })
    }

    pub async fn update_title(
        &self,
        conn: &mut PgConnection,
        id: &str,
        title: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| {
                error!("Failed to update conversation title {id}: {e}");
                AppError::db_query("Failed to update conversation", e)
            })?;
        Ok(())
    }

    pub async fn update_timestamp(
        &self,
        conn: &mut PgConnection,
        id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| {
                error!("Failed to update conversation timestamp {id}: {e}");
                AppError::db_query("Failed to update conversation", e)
            })?;
        Ok(())
    }

    /// Deletes the row (messages cascade). Returns whether a row matched.
    pub async fn delete_for_owner(
        &self,
        conn: &mut PgConnection,
        id: &str,
        owner_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(conn)
            .await
            .map_err(|e| {
                error!("Failed to delete conversation {id}: {e}");
                AppError::db_query("Failed to delete conversation", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}
