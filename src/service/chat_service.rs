use std::sync::Arc;

use tracing::{info, warn};

use super::locks::ConversationLocks;
use crate::agent::{
    build_history, select_budget, GenerationRequest, ModelClient, SYSTEM_INSTRUCTION,
};
use crate::db::ConversationStore;
use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse, Conversation, ConversationSummary, Message};

pub const MAX_MESSAGE_LENGTH: usize = 32_000;

/// Rejects text that is blank after trimming or longer than [`MAX_MESSAGE_LENGTH`].
pub fn validate_message(message: &str) -> Result<(), AppError> {
    if message.trim().is_empty() {
        return Err(AppError::EmptyField { field_name: "message".to_string() });
    }
    let length = message.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(AppError::FieldTooLong {
            field_name: "message".to_string(),
            max_length: MAX_MESSAGE_LENGTH,
            actual_length: length,
        });
    }
    Ok(())
}

/// Turns a new user message into a model request and commits the exchange.
///
/// Nothing is written until the model has replied: a failed generation
/// leaves the store exactly as it was, and a new conversation is only
/// created once there is a reply to put in it. Sends against the same
/// existing conversation are serialized.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    model: Arc<dyn ModelClient>,
    default_model: String,
    locks: ConversationLocks,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn ModelClient>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            model,
            default_model: default_model.into(),
            locks: ConversationLocks::new(),
        }
    }

    pub async fn list_conversations(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        self.store.list_summaries(owner_id).await
    }

    pub async fn get_conversation(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, AppError> {
        self.store.get(conversation_id, owner_id).await
    }

    /// Deletes the record and hands it back; attachment files are the caller's to remove.
    pub async fn delete_conversation(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, AppError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let deleted = self.store.delete(conversation_id, owner_id).await?;
        info!("Deleted conversation {conversation_id}");
        Ok(deleted)
    }

    pub async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let ChatRequest { owner_id, conversation_id, message, attachments } = request;

        // ── Validation ────────────────────────────────────────────────────────
        validate_message(&message)?;
        self.model.ensure_configured()?;

        // ── Resolve conversation ──────────────────────────────────────────────
        let _guard = match &conversation_id {
            Some(id) => Some(self.locks.acquire(id).await),
            None => None,
        };
        let existing = match &conversation_id {
            Some(id) => Some(self.store.get(id, &owner_id).await?),
            None => None,
        };

        // ── Build the model request from the prior turns ──────────────────────
        let prior: &[Message] = existing
            .as_ref()
            .map(|c| c.messages.as_slice())
            .unwrap_or_default();
        let history = build_history(prior);
        let budget = select_budget(&message);
        let model_id = existing
            .as_ref()
            .map(|c| c.model_id.as_str())
            .unwrap_or(&self.default_model);

        let reply = self
            .model
            .generate(GenerationRequest {
                model: model_id,
                history: &history,
                message: &message,
                budget,
                system_instruction: SYSTEM_INSTRUCTION,
            })
            .await
            .inspect_err(|e| warn!("Generation failed, nothing persisted: {e}"))?;

        // ── Commit both turns ─────────────────────────────────────────────────
        let user_message = Message::user(message, attachments);
        let assistant_message = Message::assistant(reply);

        let conversation = match existing {
            Some(mut conversation) => {
                self.store
                    .append_exchange(&conversation.id, &user_message, &assistant_message)
                    .await?;
                conversation.push_message(user_message);
                conversation.push_message(assistant_message.clone());
                conversation
            }
            None => {
                let created = self
                    .store
                    .create_with_exchange(
                        &owner_id,
                        &self.default_model,
                        &user_message,
                        &assistant_message,
                    )
                    .await?;
                info!("Created conversation {} for owner {owner_id}", created.id);
                created
            }
        };

        Ok(ChatResponse {
            conversation_id: conversation.id,
            message: assistant_message.content,
            title: conversation.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::{Speaker, TokenBudget, Turn};
    use crate::db::MemoryConversationStore;
    use crate::models::DEFAULT_TITLE;

    #[derive(Debug, Clone)]
    struct RecordedCall {
        model: String,
        history: Vec<Turn>,
        message: String,
        budget: TokenBudget,
    }

    #[derive(Default)]
    struct MockModel {
        calls: Mutex<Vec<RecordedCall>>,
        fail: bool,
        unconfigured: bool,
    }

    impl MockModel {
        fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        fn unconfigured() -> Self {
            Self { unconfigured: true, ..Self::default() }
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for MockModel {
        fn ensure_configured(&self) -> Result<(), AppError> {
            if self.unconfigured {
                return Err(AppError::Configuration { message: "API key not found".into() });
            }
            Ok(())
        }

        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, AppError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: request.model.to_string(),
                history: request.history.to_vec(),
                message: request.message.to_string(),
                budget: request.budget,
            });
            if self.fail {
                return Err(AppError::Upstream { message: "quota exceeded".into() });
            }
            Ok(format!("reply to: {}", request.message))
        }
    }

    /// Memory store whose multi-message writes fail, as a full disk would.
    struct FailingCommitStore {
        inner: Arc<MemoryConversationStore>,
    }

    fn disk_full() -> AppError {
        AppError::Storage { message: "disk full".into() }
    }

    #[async_trait]
    impl ConversationStore for FailingCommitStore {
        async fn create(&self, owner_id: &str, model_id: &str) -> Result<Conversation, AppError> {
            self.inner.create(owner_id, model_id).await
        }

        async fn create_with_exchange(
            &self,
            _owner_id: &str,
            _model_id: &str,
            _user: &Message,
            _assistant: &Message,
        ) -> Result<Conversation, AppError> {
            Err(disk_full())
        }

        async fn get(
            &self,
            conversation_id: &str,
            owner_id: &str,
        ) -> Result<Conversation, AppError> {
            self.inner.get(conversation_id, owner_id).await
        }

        async fn append(&self, conversation_id: &str, message: &Message) -> Result<(), AppError> {
            self.inner.append(conversation_id, message).await
        }

        async fn append_exchange(
            &self,
            _conversation_id: &str,
            _user: &Message,
            _assistant: &Message,
        ) -> Result<(), AppError> {
            Err(disk_full())
        }

        async fn list_summaries(
            &self,
            owner_id: &str,
        ) -> Result<Vec<ConversationSummary>, AppError> {
            self.inner.list_summaries(owner_id).await
        }

        async fn delete(
            &self,
            conversation_id: &str,
            owner_id: &str,
        ) -> Result<Conversation, AppError> {
            self.inner.delete(conversation_id, owner_id).await
        }
    }

    fn service(store: Arc<dyn ConversationStore>, model: Arc<MockModel>) -> ChatService {
        ChatService::new(store, model, "gemini-2.5-flash")
    }

    fn request(conversation_id: Option<&str>, message: &str) -> ChatRequest {
        ChatRequest {
            owner_id: "owner-a".into(),
            conversation_id: conversation_id.map(str::to_string),
            message: message.into(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn new_conversation_then_follow_up() {
        let store = Arc::new(MemoryConversationStore::new());
        let model = Arc::new(MockModel::default());
        let svc = service(store.clone(), model.clone());

        let first = svc.send_message(request(None, "Explain recursion")).await.unwrap();
        assert_eq!(first.title, "Explain recursion");
        assert_eq!(first.message, "reply to: Explain recursion");
        assert_eq!(store.len(), 1);

        let second = svc
            .send_message(request(Some(&first.conversation_id), "thanks"))
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.title, "Explain recursion");

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].history.is_empty());
        assert_eq!(calls[0].budget, TokenBudget::Medium);
        assert_eq!(calls[0].model, "gemini-2.5-flash");

        assert_eq!(calls[1].budget, TokenBudget::Short);
        assert_eq!(calls[1].message, "thanks");
        assert_eq!(
            calls[1].history,
            vec![
                Turn { speaker: Speaker::User, text: "Explain recursion".into() },
                Turn { speaker: Speaker::Model, text: "reply to: Explain recursion".into() },
            ]
        );

        let stored = svc
            .get_conversation("owner-a", &first.conversation_id)
            .await
            .unwrap();
        assert_eq!(stored.messages.len(), 4);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_touching_the_store() {
        let store = Arc::new(MemoryConversationStore::new());
        let model = Arc::new(MockModel::default());
        let svc = service(store.clone(), model.clone());

        let err = svc
            .send_message(request(Some("does-not-exist"), "   \n\t"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyField { .. }));
        assert!(store.is_empty());
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_silently_created() {
        let store = Arc::new(MemoryConversationStore::new());
        let svc = service(store.clone(), Arc::new(MockModel::default()));

        let err = svc
            .send_message(request(Some("does-not-exist"), "hello"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn another_owners_conversation_is_not_found() {
        let store = Arc::new(MemoryConversationStore::new());
        let svc = service(store.clone(), Arc::new(MockModel::default()));
        let created = svc.send_message(request(None, "hello")).await.unwrap();

        let mut foreign = request(Some(&created.conversation_id), "hijack");
        foreign.owner_id = "owner-b".into();
        let err = svc.send_message(foreign).await.unwrap_err();
        assert!(err.is_not_found());

        let err = svc
            .delete_conversation("owner-b", &created.conversation_id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_generation_persists_nothing() {
        let store = Arc::new(MemoryConversationStore::new());
        let svc = service(store.clone(), Arc::new(MockModel::failing()));

        let err = svc.send_message(request(None, "hello")).await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_follow_up_leaves_existing_history_untouched() {
        let store = Arc::new(MemoryConversationStore::new());
        let ok = service(store.clone(), Arc::new(MockModel::default()));
        let created = ok.send_message(request(None, "hello")).await.unwrap();

        let failing = service(store.clone(), Arc::new(MockModel::failing()));
        failing
            .send_message(request(Some(&created.conversation_id), "again"))
            .await
            .unwrap_err();

        let stored = ok.get_conversation("owner-a", &created.conversation_id).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_conversation_behind() {
        let inner = Arc::new(MemoryConversationStore::new());
        let healthy = service(inner.clone(), Arc::new(MockModel::default()));
        let existing = healthy.send_message(request(None, "hello")).await.unwrap();

        let failing = service(
            Arc::new(FailingCommitStore { inner: inner.clone() }),
            Arc::new(MockModel::default()),
        );
        let err = failing
            .send_message(request(None, "Explain recursion"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }), "got {err}");

        let err = failing
            .send_message(request(Some(&existing.conversation_id), "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }), "got {err}");

        let summaries = healthy.list_conversations("owner-a").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, existing.conversation_id);
        let stored = healthy
            .get_conversation("owner-a", &existing.conversation_id)
            .await
            .unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn missing_configuration_fails_before_creating_anything() {
        let store = Arc::new(MemoryConversationStore::new());
        let model = Arc::new(MockModel::unconfigured());
        let svc = service(store.clone(), model.clone());

        let err = svc.send_message(request(None, "hello")).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(store.is_empty());
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn long_first_message_title_is_truncated_once() {
        let store = Arc::new(MemoryConversationStore::new());
        let svc = service(store, Arc::new(MockModel::default()));
        let long = "w".repeat(80);

        let first = svc.send_message(request(None, &long)).await.unwrap();
        assert_eq!(first.title.chars().count(), 53);
        assert!(first.title.ends_with("..."));
        assert_ne!(first.title, DEFAULT_TITLE);

        let second = svc
            .send_message(request(Some(&first.conversation_id), "short"))
            .await
            .unwrap();
        assert_eq!(second.title, first.title);
    }

    #[test]
    fn validation_limits() {
        assert!(validate_message("hi").is_ok());
        assert!(matches!(validate_message(" "), Err(AppError::EmptyField { .. })));
        assert!(matches!(
            validate_message(&"a".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(AppError::FieldTooLong { .. })
        ));
    }
}
