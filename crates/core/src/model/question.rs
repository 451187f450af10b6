use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id must be > 0")]
    InvalidId,

    #[error("question {id} has empty text")]
    EmptyText { id: QuestionId },

    #[error("question {id} has no options")]
    NoOptions { id: QuestionId },

    #[error("question {id} has an option with an empty label")]
    EmptyLabel { id: QuestionId },

    #[error("question {id} repeats option label {label:?}")]
    DuplicateLabel { id: QuestionId, label: String },

    #[error("question {id}: correct answer {label:?} matches no option")]
    UnknownCorrectAnswer { id: QuestionId, label: String },
}

//
// ─── TYPES ─────────────────────────────────────────────────────────────────────
//

/// A labeled answer choice, e.g. `A: "Use a flow"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerOption {
    pub label: String,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Unvalidated question as it appears in a question bank file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: u64,
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub correct_answer: String,
    #[serde(default)]
    pub tip: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id is zero, text or labels are blank,
    /// labels repeat, or the correct answer is not one of the option labels.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.id == 0 {
            return Err(QuestionError::InvalidId);
        }
        let id = QuestionId::new(self.id);

        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(QuestionError::EmptyText { id });
        }
        if self.options.is_empty() {
            return Err(QuestionError::NoOptions { id });
        }

        let mut options = Vec::with_capacity(self.options.len());
        for option in self.options {
            let label = option.label.trim().to_string();
            if label.is_empty() {
                return Err(QuestionError::EmptyLabel { id });
            }
            if options.iter().any(|o: &AnswerOption| o.label == label) {
                return Err(QuestionError::DuplicateLabel { id, label });
            }
            options.push(AnswerOption::new(label, option.text));
        }

        let correct_answer = self.correct_answer.trim().to_string();
        if !options.iter().any(|o| o.label == correct_answer) {
            return Err(QuestionError::UnknownCorrectAnswer {
                id,
                label: correct_answer,
            });
        }

        Ok(Question {
            id,
            text,
            options,
            correct_answer,
            tip: normalize_optional(self.tip),
            title: normalize_optional(self.title),
        })
    }
}

/// A validated multiple-choice question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<AnswerOption>,
    correct_answer: String,
    tip: Option<String>,
    title: Option<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Options in bank-definition order.
    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn has_option(&self, label: &str) -> bool {
        self.options.iter().any(|o| o.label == label)
    }

    #[must_use]
    pub fn is_correct(&self, label: &str) -> bool {
        self.correct_answer == label
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
