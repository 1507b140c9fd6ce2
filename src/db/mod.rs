pub mod conversation_repository;
pub mod memory;
pub mod message_repository;
pub mod postgres;
pub mod testing;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Conversation, ConversationSummary, Message};

pub use memory::MemoryConversationStore;
pub use postgres::PgConversationStore;

/// Persistence for conversations and their messages.
///
/// Every lookup is scoped by owner: a conversation that exists but belongs to
/// someone else is reported as [`AppError::ConversationNotFound`], exactly
/// like one that does not exist.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a new, empty conversation with the default title.
    async fn create(&self, owner_id: &str, model_id: &str) -> Result<Conversation, AppError>;

    /// Persists a new conversation already holding its first exchange, as one
    /// write: either the conversation exists with both turns, or nothing does.
    async fn create_with_exchange(
        &self,
        owner_id: &str,
        model_id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<Conversation, AppError>;

    async fn get(&self, conversation_id: &str, owner_id: &str) -> Result<Conversation, AppError>;

    /// Appends one message, refreshing `updated_at` and deriving the title
    /// from the first message while it is still the placeholder.
    async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), AppError>;

    /// Appends a user turn and its reply as one logical write.
    async fn append_exchange(
        &self,
        conversation_id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), AppError> {
        self.append(conversation_id, user).await?;
        self.append(conversation_id, assistant).await
    }

    /// Owner's conversations, most recently updated first.
    async fn list_summaries(&self, owner_id: &str) -> Result<Vec<ConversationSummary>, AppError>;

    /// Removes the record and returns it so the caller can clean up attachment files.
    async fn delete(
        &self,
        conversation_id: &str,
        owner_id: &str,
    ) -> Result<Conversation, AppError>;
}
