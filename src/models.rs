use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title every conversation starts with.
pub const DEFAULT_TITLE: &str = "New Chat";
/// Characters kept from the first message when deriving a title.
pub const TITLE_MAX_CHARS: usize = 50;
const TITLE_ELLIPSIS: &str = "...";

/// Derives a conversation title from the content of its first message.
pub fn derive_title(first_message: &str) -> String {
    if first_message.chars().count() > TITLE_MAX_CHARS {
        let head: String = first_message.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}{TITLE_ELLIPSIS}")
    } else {
        first_message.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(owner_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            model_id: model_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message, refreshes `updated_at` and derives the title if it
    /// is still the placeholder.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.derive_title_once();
        self.updated_at = Utc::now();
    }

    fn derive_title_once(&mut self) {
        if self.title != DEFAULT_TITLE {
            return;
        }
        if let Some(first) = self.messages.first() {
            self.title = derive_title(&first.content);
        }
    }

    /// Every attachment referenced by any message, in message order.
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.messages.iter().flat_map(|m| m.attachments.iter())
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing row for an owner's conversations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Metadata for an uploaded file; the bytes live on disk at `storage_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub original_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: String, attachments: Vec<Attachment>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            attachments,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self::new(MessageRole::User, content.into(), attachments)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), Vec::new())
    }
}

/// Input of a single send operation, after the owner has been resolved.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub owner_id: String,
    pub conversation_id: Option<String>,
    pub message: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: String,
    pub message: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_first_message_becomes_title_unchanged() {
        assert_eq!(derive_title("Explain recursion"), "Explain recursion");
        let exactly_fifty = "a".repeat(50);
        assert_eq!(derive_title(&exactly_fifty), exactly_fifty);
    }

    #[test]
    fn long_first_message_is_truncated_with_ellipsis() {
        let title = derive_title(&"x".repeat(51));
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let title = derive_title(&"é".repeat(60));
        assert_eq!(title.chars().count(), 53);
    }

    #[test]
    fn title_is_derived_once_from_first_message() {
        let mut conv = Conversation::new("owner-a", "gemini-2.5-flash");
        assert_eq!(conv.title, DEFAULT_TITLE);

        conv.push_message(Message::user("hello there", vec![]));
        conv.push_message(Message::assistant("hi"));
        assert_eq!(conv.title, "hello there");

        conv.push_message(Message::user("a different question", vec![]));
        assert_eq!(conv.title, "hello there");
    }

    #[test]
    fn push_message_refreshes_updated_at() {
        let mut conv = Conversation::new("owner-a", "m");
        let before = conv.updated_at;
        conv.push_message(Message::user("hi", vec![]));
        assert!(conv.updated_at >= before);
    }

    #[test]
    fn role_parsing_rejects_unknown_values() {
        assert_eq!(MessageRole::try_from("user".to_string()), Ok(MessageRole::User));
        assert_eq!(
            MessageRole::try_from("assistant".to_string()),
            Ok(MessageRole::Assistant)
        );
        assert!(MessageRole::try_from("system".to_string()).is_err());
        assert!(MessageRole::try_from("model".to_string()).is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert!(serde_json::from_str::<MessageRole>("\"system\"").is_err());
    }
}
