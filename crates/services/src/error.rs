//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{BankError, ChatSettingsError, QuestionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("failed to encode quiz state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Invalid(#[from] ChatSettingsError),
    #[error("failed to encode chat settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the chat assistant. None of them touch quiz state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("no API key configured for the chat assistant")]
    MissingApiKey,
    #[error("the chat API rejected the API key")]
    InvalidApiKey,
    #[error("a reply for question {0} is already pending")]
    Busy(QuestionId),
    #[error("chat request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("chat API returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("failed to encode chat history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] SettingsServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Settings(#[from] ChatSettingsError),
    #[error(transparent)]
    Quiz(#[from] QuizServiceError),
}
