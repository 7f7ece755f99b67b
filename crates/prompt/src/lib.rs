#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Prompt construction for the support assistant.
//!
//! The model was fine-tuned on a plain `### Role:` transcript format. A prompt
//! is the system header, the most recent turns of the conversation and the new
//! user message, closed by an empty assistant label so the model's next tokens
//! are read as the assistant's reply.
//!
//! Contract: identical inputs -> identical prompt string. Nothing here
//! validates or escapes user text; a message containing a label is rendered
//! verbatim.

use serde::{Deserialize, Serialize};

/// Instruction placed in the system header of every prompt.
pub const SYSTEM_PROMPT: &str = "You are a helpful customer support assistant. \
Be clear, practical, and polite. \
If needed, ask 1-2 clarifying questions. \
Do not invent company policies.";

/// Number of most recent turns rendered into a prompt.
pub const HISTORY_WINDOW: usize = 6;

/// Label opening the system header.
pub const SYSTEM_LABEL: &str = "### System:";
/// Label opening a user block.
pub const USER_LABEL: &str = "### User:";
/// Label opening an assistant block; the continuation marker.
pub const ASSISTANT_LABEL: &str = "### Assistant:";

/// One exchange of the conversation: what the user said and what the assistant answered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Turn {
    /// user utterance
    pub user: String,
    /// assistant utterance
    pub assistant: String,
}

impl Turn {
    /// Create a turn from the user and assistant texts.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Template used to render prompts: the system instruction and the window size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// text placed under the system label
    pub system: String,
    /// how many of the latest turns are rendered
    pub window: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            window: HISTORY_WINDOW,
        }
    }
}

impl PromptTemplate {
    /// Template with a custom system instruction and the default window.
    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Self::default()
        }
    }

    /// Render `message` after the latest `self.window` turns of `history`.
    ///
    /// The result always ends with `"### Assistant:\n"`.
    pub fn build(&self, message: &str, history: &[Turn]) -> String {
        let recent = window(history, self.window);
        let body: usize = recent
            .iter()
            .map(|t| t.user.len() + t.assistant.len() + 48)
            .sum();
        let mut text = String::with_capacity(self.system.len() + message.len() + body + 64);

        text.push_str(SYSTEM_LABEL);
        text.push('\n');
        text.push_str(&self.system);
        text.push_str("\n\n");
        for turn in recent {
            push_block(&mut text, USER_LABEL, &turn.user);
            push_block(&mut text, ASSISTANT_LABEL, &turn.assistant);
        }
        push_block(&mut text, USER_LABEL, message);
        text.push_str(ASSISTANT_LABEL);
        text.push('\n');
        text
    }
}

fn push_block(text: &mut String, label: &str, content: &str) {
    text.push_str(label);
    text.push('\n');
    text.push_str(content);
    text.push_str("\n\n");
}

/// Build a prompt with the default system instruction and window.
pub fn build_prompt(message: &str, history: &[Turn]) -> String {
    PromptTemplate::default().build(message, history)
}

/// The last `n` turns of `history` (all of them when shorter).
pub fn window(history: &[Turn], n: usize) -> &[Turn] {
    let start = history.len().saturating_sub(n);
    history.get(start..).unwrap_or_default()
}

/// Extract the assistant reply from decoded model output.
///
/// Returns the text after the last continuation marker, trimmed. Output without
/// a marker is returned whole, trimmed.
pub fn extract_reply(decoded: &str) -> &str {
    decoded
        .rsplit_once(ASSISTANT_LABEL)
        .map_or(decoded, |(_, reply)| reply)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbered(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| Turn::new(format!("question {i}"), format!("answer {i}")))
            .collect()
    }

    #[test]
    fn empty_history_renders_header_and_new_turn() {
        let prompt = build_prompt("Where is my order?", &[]);
        let expected = format!(
            "### System:\n{SYSTEM_PROMPT}\n\n### User:\nWhere is my order?\n\n### Assistant:\n"
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn turns_render_user_then_assistant() {
        let history = vec![Turn::new("hi", "Hello! How can I help?")];
        let prompt = build_prompt("refund please", &history);
        assert!(prompt.contains(
            "### User:\nhi\n\n### Assistant:\nHello! How can I help?\n\n### User:\nrefund please\n\n"
        ));
        assert!(prompt.ends_with("### Assistant:\n"));
    }

    #[test]
    fn only_last_six_turns_are_kept() {
        let history = numbered(9);
        let prompt = build_prompt("next", &history);
        for i in 0..3 {
            assert!(!prompt.contains(&format!("question {i}\n")), "turn {i} leaked");
        }
        for i in 3..9 {
            assert!(prompt.contains(&format!("question {i}\n")));
            assert!(prompt.contains(&format!("answer {i}\n")));
        }
    }

    #[test]
    fn empty_strings_are_accepted() {
        let prompt = build_prompt("", &[Turn::new("", "")]);
        assert_eq!(prompt.matches(USER_LABEL).count(), 2);
        assert!(prompt.ends_with("### User:\n\n\n### Assistant:\n"));
    }

    #[test]
    fn custom_system_instruction() {
        let template = PromptTemplate::with_system("Answer in French.");
        let prompt = template.build("hello", &[]);
        assert!(prompt.starts_with("### System:\nAnswer in French.\n\n"));
    }

    #[test]
    fn window_shorter_history_is_whole() {
        let history = numbered(2);
        assert_eq!(window(&history, 6), history.as_slice());
        assert!(window(&history, 0).is_empty());
    }

    #[test]
    fn extract_reply_after_marker() {
        let decoded = "### System:\nbe nice\n\n### User:\nhello\n\n### Assistant:\n Thanks for reaching out! \n";
        assert_eq!(extract_reply(decoded), "Thanks for reaching out!");
    }

    #[test]
    fn extract_reply_uses_last_marker() {
        let decoded = "### Assistant:\nold\n\n### User:\nnew\n\n### Assistant:\nlatest";
        assert_eq!(extract_reply(decoded), "latest");
    }

    #[test]
    fn extract_reply_without_marker_returns_trimmed_text() {
        assert_eq!(extract_reply("  just some text\n"), "just some text");
    }

    #[test]
    fn extract_reply_empty_after_marker() {
        assert_eq!(extract_reply("### Assistant:\n   "), "");
    }

    #[test]
    fn appending_a_turn_keeps_previous_turns_verbatim() {
        let history = numbered(3);
        let first = build_prompt("my parcel is late", &history);
        let reply = extract_reply("### Assistant:\nSorry to hear that.").to_string();

        let mut next_history = history.clone();
        next_history.push(Turn::new("my parcel is late", reply));
        let second = build_prompt("thanks", &next_history);

        // the first prompt minus its trailing marker is a prefix of the second
        let head = first.trim_end_matches("### Assistant:\n");
        assert!(second.starts_with(head));
        assert!(second.contains("### Assistant:\nSorry to hear that.\n\n### User:\nthanks\n\n"));
    }

    proptest! {
        #[test]
        fn prompt_renders_window_in_order(
            texts in prop::collection::vec(("[a-z ]{0,12}", "[a-z ]{0,12}"), 0..12),
            message in "[a-z ]{0,20}",
        ) {
            let history: Vec<Turn> = texts.iter().map(|(u, a)| Turn::new(u.as_str(), a.as_str())).collect();
            let prompt = build_prompt(&message, &history);
            let kept = history.len().min(HISTORY_WINDOW);

            prop_assert_eq!(prompt.matches(USER_LABEL).count(), kept + 1);
            prop_assert_eq!(prompt.matches(ASSISTANT_LABEL).count(), kept + 1);
            prop_assert!(prompt.ends_with("### Assistant:\n"));

            let mut expected = format!("### System:\n{SYSTEM_PROMPT}\n\n");
            for turn in history.iter().skip(history.len() - kept) {
                expected.push_str(&format!("### User:\n{}\n\n### Assistant:\n{}\n\n", turn.user, turn.assistant));
            }
            expected.push_str(&format!("### User:\n{message}\n\n### Assistant:\n"));
            prop_assert_eq!(prompt, expected);
        }

        #[test]
        fn reply_round_trips_through_extraction(reply in "[A-Za-z!?.,]{1}[A-Za-z !?.,]{0,30}[A-Za-z!?.,]{1}") {
            let prompt = build_prompt("hello", &[]);
            let decoded = format!("{prompt}{reply}");
            prop_assert_eq!(extract_reply(&decoded), reply.as_str());
        }
    }
}
