use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::model::question::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of a per-question conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// Freeform description of a question handed to the chat assistant.
///
/// Lists the options in bank order so labels line up with what the assistant
/// is told the correct answer is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionContext(String);

impl QuestionContext {
    #[must_use]
    pub fn describe(question: &Question, user_answer: Option<&str>) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "**Question:** {}", question.text());
        out.push('\n');
        out.push_str("**Options:**\n");
        for option in question.options() {
            let _ = writeln!(out, "- {}: {}", option.label, option.text);
        }
        out.push('\n');
        let _ = writeln!(out, "**Correct answer:** {}", question.correct_answer());
        out.push('\n');
        let _ = writeln!(
            out,
            "**User's answer:** {}",
            user_answer.unwrap_or("Not answered")
        );
        if let Some(tip) = question.tip() {
            out.push('\n');
            let _ = writeln!(out, "**Tip:** {tip}");
        }
        Self(out.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
