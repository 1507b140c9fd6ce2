use super::{Speaker, Turn};
use crate::models::{Message, MessageRole};

/// Converts stored messages into the turn sequence sent as model context.
///
/// The in-flight user message is sent on its own, so callers pass the
/// messages as they were *before* appending it. Order is preserved and
/// attachments are not inlined.
pub fn build_history(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| Turn {
            speaker: match m.role {
                MessageRole::User => Speaker::User,
                MessageRole::Assistant => Speaker::Model,
            },
            text: m.content.clone(),
        })
        .collect()
}
