//! Behaviour every [`ConversationStore`] backend must share.
//!
//! Owner ids are unique per run, so the suite can point at a database that
//! already holds other data.

use super::ConversationStore;
use crate::errors::AppError;
use crate::models::{Attachment, Message, MessageRole, DEFAULT_TITLE};

fn owner(label: &str) -> String {
    format!("{label}-{}", uuid::Uuid::new_v4().simple())
}

fn attachment(name: &str, mime: &str) -> Attachment {
    Attachment {
        original_name: name.to_string(),
        storage_path: format!("uploads/1700000000000-{name}"),
        mime_type: mime.to_string(),
        size_bytes: 2048,
    }
}

/// Run the full conversation store conformance suite.
///
/// # Errors
///
/// Returns the first store error hit; behavioural mismatches panic.
pub async fn run_store_conformance(store: &dyn ConversationStore) -> Result<(), AppError> {
    test_create_starts_empty(store).await?;
    test_lookup_is_owner_scoped(store).await?;
    test_append_keeps_order_and_titles_once(store).await?;
    test_append_to_missing_is_not_found(store).await?;
    test_create_with_exchange(store).await?;
    test_attachments_round_trip(store).await?;
    test_summaries_are_scoped_and_recent_first(store).await?;
    test_delete_is_owner_scoped(store).await?;
    Ok(())
}

async fn test_create_starts_empty(store: &dyn ConversationStore) -> Result<(), AppError> {
    let owner_a = owner("create");
    let created = store.create(&owner_a, "gemini-2.5-flash").await?;
    assert!(created.messages.is_empty());
    assert_eq!(created.title, DEFAULT_TITLE);

    let fetched = store.get(&created.id, &owner_a).await?;
    assert_eq!(fetched.owner_id, owner_a);
    assert_eq!(fetched.model_id, "gemini-2.5-flash");
    assert_eq!(fetched.title, DEFAULT_TITLE);
    assert!(fetched.messages.is_empty());
    Ok(())
}

async fn test_lookup_is_owner_scoped(store: &dyn ConversationStore) -> Result<(), AppError> {
    let (owner_a, owner_b) = (owner("scoped-a"), owner("scoped-b"));
    let created = store.create(&owner_a, "m").await?;

    let err = store.get(&created.id, &owner_b).await.unwrap_err();
    assert!(err.is_not_found(), "foreign owner should see NotFound, got {err}");
    let err = store.get("no-such-conversation", &owner_a).await.unwrap_err();
    assert!(err.is_not_found(), "missing id should be NotFound, got {err}");
    Ok(())
}

async fn test_append_keeps_order_and_titles_once(
    store: &dyn ConversationStore,
) -> Result<(), AppError> {
    let owner_a = owner("append");
    let created = store.create(&owner_a, "m").await?;
    let long_question = "q".repeat(70);

    store
        .append_exchange(
            &created.id,
            &Message::user(long_question.as_str(), vec![]),
            &Message::assistant("first answer"),
        )
        .await?;
    store
        .append(&created.id, &Message::user("second question", vec![]))
        .await?;
    store
        .append(&created.id, &Message::assistant("second answer"))
        .await?;

    let stored = store.get(&created.id, &owner_a).await?;
    let contents: Vec<&str> = stored.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        [long_question.as_str(), "first answer", "second question", "second answer"]
    );
    let roles: Vec<MessageRole> = stored.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant
        ]
    );
    assert_eq!(stored.title, format!("{}...", "q".repeat(50)));
    assert!(stored.updated_at >= stored.created_at);
    Ok(())
}

async fn test_append_to_missing_is_not_found(
    store: &dyn ConversationStore,
) -> Result<(), AppError> {
    let err = store
        .append("no-such-conversation", &Message::user("hello", vec![]))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "append to missing id should be NotFound, got {err}");
    Ok(())
}

async fn test_create_with_exchange(store: &dyn ConversationStore) -> Result<(), AppError> {
    let owner_a = owner("exchange");
    let created = store
        .create_with_exchange(
            &owner_a,
            "gemini-2.5-flash",
            &Message::user("Explain recursion", vec![]),
            &Message::assistant("A function calling itself."),
        )
        .await?;
    assert_eq!(created.title, "Explain recursion");
    assert_eq!(created.messages.len(), 2);

    let stored = store.get(&created.id, &owner_a).await?;
    assert_eq!(stored.title, "Explain recursion");
    assert_eq!(stored.model_id, "gemini-2.5-flash");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].role, MessageRole::User);
    assert_eq!(stored.messages[1].content, "A function calling itself.");

    // Later turns never re-derive the title.
    store
        .append(&created.id, &Message::user("thanks", vec![]))
        .await?;
    assert_eq!(store.get(&created.id, &owner_a).await?.title, "Explain recursion");
    Ok(())
}

async fn test_attachments_round_trip(store: &dyn ConversationStore) -> Result<(), AppError> {
    let owner_a = owner("attachments");
    let files = vec![
        attachment("report.pdf", "application/pdf"),
        attachment("photo.png", "image/png"),
    ];
    let created = store
        .create_with_exchange(
            &owner_a,
            "m",
            &Message::user("see attached", files.clone()),
            &Message::assistant("got them"),
        )
        .await?;

    let stored = store.get(&created.id, &owner_a).await?;
    assert_eq!(stored.messages[0].attachments, files);
    assert!(stored.messages[1].attachments.is_empty());
    Ok(())
}

async fn test_summaries_are_scoped_and_recent_first(
    store: &dyn ConversationStore,
) -> Result<(), AppError> {
    let (owner_a, owner_b) = (owner("list-a"), owner("list-b"));
    let older = store.create(&owner_a, "m").await?;
    let newer = store.create(&owner_a, "m").await?;
    store.create(&owner_b, "m").await?;

    let summaries = store.list_summaries(&owner_a).await?;
    let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, [newer.id.as_str(), older.id.as_str()]);

    store.append(&older.id, &Message::user("bump", vec![])).await?;

    let summaries = store.list_summaries(&owner_a).await?;
    let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, [older.id.as_str(), newer.id.as_str()]);
    assert_eq!(summaries[0].title, "bump");
    assert!(summaries[0].updated_at >= summaries[1].updated_at);

    assert_eq!(store.list_summaries(&owner_b).await?.len(), 1);
    Ok(())
}

async fn test_delete_is_owner_scoped(store: &dyn ConversationStore) -> Result<(), AppError> {
    let (owner_a, owner_b) = (owner("delete-a"), owner("delete-b"));
    let file = attachment("notes.txt", "text/plain");
    let created = store
        .create_with_exchange(
            &owner_a,
            "m",
            &Message::user("keep this", vec![file.clone()]),
            &Message::assistant("kept"),
        )
        .await?;

    let err = store.delete(&created.id, &owner_b).await.unwrap_err();
    assert!(err.is_not_found(), "foreign delete should be NotFound, got {err}");
    assert!(store.get(&created.id, &owner_a).await.is_ok());

    let deleted = store.delete(&created.id, &owner_a).await?;
    assert_eq!(deleted.messages.len(), 2);
    assert_eq!(deleted.attachments().cloned().collect::<Vec<_>>(), [file]);

    assert!(store.get(&created.id, &owner_a).await.unwrap_err().is_not_found());
    assert!(store.list_summaries(&owner_a).await?.is_empty());
    assert!(store.delete(&created.id, &owner_a).await.unwrap_err().is_not_found());
    Ok(())
}
