//! Conversation Assembler (`spec.md` §4.4). Builds the message sequence
//! handed to the LLM by combining the latest summary, unsummarized
//! messages, and synthetic advisory messages — grounded on
//! `gateway/src/runtime/mod.rs::build_system_context`'s assemble-from-parts
//! idiom.

use crate::collaborators::{MessageStore, SummaryStore};
use crate::error::Result;
use crate::model::Message;

/// Advisory text appended when computer-tool degradation is active
/// (`spec.md` §4.4 step 4).
pub const COMPUTER_TOOLS_DISABLED_ADVISORY: &str =
    "Desktop automation tools are currently unavailable after repeated \
     failures. Do not request any computer_* tool; continue the task \
     through other means or request help.";

/// Assemble the ordered conversation for one turn. Synthetic messages
/// (summary prefix, advisory suffix) are never persisted — callers must not
/// pass them to `MessageStore::create`.
pub async fn assemble(
    message_store: &dyn MessageStore,
    summary_store: &dyn SummaryStore,
    task_id: &str,
    computer_tools_disabled: bool,
) -> Result<Vec<Message>> {
    let mut out = Vec::new();

    if let Some(summary) = summary_store.find_latest(task_id).await? {
        out.push(Message::synthetic_user_text(summary.content));
    }

    let unsummarized = message_store.find_unsummarized(task_id).await?;
    out.extend(unsummarized);

    if computer_tools_disabled {
        out.push(Message::synthetic_user_text(COMPUTER_TOOLS_DISABLED_ADVISORY));
    }

    Ok(out)
}
