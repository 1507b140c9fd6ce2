use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, error};

use super::conversation_repository::ConversationRepository;
use super::message_repository::MessageRepository;
use super::ConversationStore;
use crate::errors::AppError;
use crate::models::{derive_title, Conversation, ConversationSummary, Message, DEFAULT_TITLE};

/// [`ConversationStore`] on PostgreSQL.
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
    conversations: ConversationRepository,
    messages: MessageRepository,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(),
            pool,
        }
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to open transaction: {e}");
            AppError::DatabaseConnectionFailed(e)
        })
    }

    async fn load(
        &self,
        conn: &mut PgConnection,
        id: &str,
        owner_id: &str,
    ) -> Result<Conversation, AppError> {
        let row = self
            .conversations
            .find_for_owner(&mut *conn, id, owner_id)
            .await?
            .ok_or_else(|| AppError::not_found(id))?;
        let messages = self.messages.find_by_conversation_id(conn, id).await?;
        Ok(row.with_messages(messages))
    }

    /// Inserts `messages` in order, then refreshes the timestamp and the
    /// placeholder title inside the caller's transaction.
    async fn append_in(
        &self,
        conn: &mut PgConnection,
        conversation_id: &str,
        messages: &[&Message],
    ) -> Result<(), AppError> {
        let title = self
            .conversations
            .lock_title(&mut *conn, conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found(conversation_id))?;

        for message in messages {
            self.messages.save(&mut *conn, conversation_id, message).await?;
        }

        if title == DEFAULT_TITLE {
            if let Some(first) = self.messages.first_content(&mut *conn, conversation_id).await? {
                let derived = derive_title(&first);
                debug!("Deriving title for conversation {conversation_id}");
                self.conversations
                    .update_title(&mut *conn, conversation_id, &derived)
                    .await?;
            }
        }

        self.conversations.update_timestamp(conn, conversation_id).await
    }

    async fn commit(tx: sqlx::Transaction<'static, sqlx::Postgres>) -> Result<(), AppError> {
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {e}");
            AppError::db_query("Failed to commit transaction", e)
        })
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create(&self, owner_id: &str, model_id: &str) -> Result<Conversation, AppError> {
        let conversation = Conversation::new(owner_id, model_id);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(AppError::DatabaseConnectionFailed)?;
        self.conversations.save(&mut conn, &conversation).await?;
        Ok(conversation)
    }

    async fn create_with_exchange(
        &self,
        owner_id: &str,
        model_id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<Conversation, AppError> {
        let mut conversation = Conversation::new(owner_id, model_id);
        let mut tx = self.begin().await?;
        self.conversations.save(&mut tx, &conversation).await?;
        self.append_in(&mut tx, &conversation.id, &[user, assistant]).await?;
        Self::commit(tx).await?;

        conversation.push_message(user.clone());
        conversation.push_message(assistant.clone());
        Ok(conversation)
    }

    async fn get(&self, conversation_id: &str, owner_id: &str) -> Result<Conversation, AppError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(AppError::DatabaseConnectionFailed)?;
        self.load(&mut conn, conversation_id, owner_id).await
    }

    async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        self.append_in(&mut tx, conversation_id, &[message]).await?;
        Self::commit(tx).await
    }

    async fn append_exchange(
        &self,
        conversation_id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        self.append_in(&mut tx, conversation_id, &[user, assistant]).await?;
        Self::commit(tx).await
    }

    async fn list_summaries(&self, owner_id: &str) -> Result<Vec<ConversationSummary>, AppError> {
        self.conversations.find_summaries(owner_id).await
    }

    async fn delete(
        &self,
        conversation_id: &str,
        owner_id: &str,
    ) -> Result<Conversation, AppError> {
        let mut tx = self.begin().await?;
        let conversation = self.load(&mut tx, conversation_id, owner_id).await?;
        if !self
            .conversations
            .delete_for_owner(&mut tx, conversation_id, owner_id)
            .await?
        {
            return Err(AppError::not_found(conversation_id));
        }
        Self::commit(tx).await?;
        Ok(conversation)
    }
}
