use std::collections::HashMap;

use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::{Question, QuestionDraft, QuestionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error("question bank is empty")]
    Empty,

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The fixed, ordered sequence of questions a quiz runs over.
///
/// Never mutated after construction; shared by reference between the engine
/// and whatever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
    positions: HashMap<QuestionId, usize>,
}

impl QuestionBank {
    /// Build a bank from validated questions.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Empty` for no questions and `BankError::DuplicateId`
    /// if two questions share an id.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        let mut positions = HashMap::with_capacity(questions.len());
        for (pos, question) in questions.iter().enumerate() {
            if positions.insert(question.id(), pos).is_some() {
                return Err(BankError::DuplicateId(question.id()));
            }
        }
        Ok(Self {
            questions,
            positions,
        })
    }

    /// Validate drafts and build a bank.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` encountered, or any `new` error.
    pub fn from_drafts(drafts: Vec<QuestionDraft>) -> Result<Self, BankError> {
        let questions = drafts
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(questions)
    }

    /// Parse a JSON array of question records.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Parse` for malformed JSON and validation errors otherwise.
    pub fn from_json(raw: &str) -> Result<Self, BankError> {
        let drafts: Vec<QuestionDraft> = serde_json::from_str(raw)?;
        Self::from_drafts(drafts)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.positions.get(&id).map(|&pos| &self.questions[pos])
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Position of `id` in bank-definition order.
    #[must_use]
    pub fn position(&self, id: QuestionId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// All ids in bank-definition order (the canonical presentation order).
    #[must_use]
    pub fn ids(&self) -> Vec<QuestionId> {
        self.questions.iter().map(Question::id).collect()
    }
}
