use async_trait::async_trait;
use dashmap::DashMap;

use super::ConversationStore;
use crate::errors::AppError;
use crate::models::{Conversation, ConversationSummary, Message};

/// In-memory [`ConversationStore`] backed by a [`DashMap`].
///
/// Used by the test suite and by `CHAT_STORE=memory` development runs.
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<String, Conversation>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(&self, owner_id: &str, model_id: &str) -> Result<Conversation, AppError> {
        let conversation = Conversation::new(owner_id, model_id);
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
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
        conversation.push_message(user.clone());
        conversation.push_message(assistant.clone());
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, conversation_id: &str, owner_id: &str) -> Result<Conversation, AppError> {
        self.conversations
            .get(conversation_id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| AppError::not_found(conversation_id))
    }

    async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), AppError> {
        let mut entry = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| AppError::not_found(conversation_id))?;
        entry.push_message(message.clone());
        Ok(())
    }

    async fn append_exchange(
        &self,
        conversation_id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), AppError> {
        // Both turns land under one shard lock.
        let mut entry = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| AppError::not_found(conversation_id))?;
        entry.push_message(user.clone());
        entry.push_message(assistant.clone());
        Ok(())
    }

    async fn list_summaries(&self, owner_id: &str) -> Result<Vec<ConversationSummary>, AppError> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.summary())
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(
        &self,
        conversation_id: &str,
        owner_id: &str,
    ) -> Result<Conversation, AppError> {
        self.conversations
            .remove_if(conversation_id, |_, c| c.owner_id == owner_id)
            .map(|(_, c)| c)
            .ok_or_else(|| AppError::not_found(conversation_id))
    }
}
