use std::sync::Arc;

use quiz_core::model::{QuestionBank, QuestionId, Score};
use quiz_core::{ConfirmOutcome, FinishOutcome, QuizEngine};
use storage::repository::{KeyValueRepository, StoreKey};
use tracing::{debug, info};

use crate::error::QuizServiceError;

/// Quiz engine with write-through persistence.
///
/// Every mutating call updates the engine and then stores the full state
/// under `StoreKey::QuizState`. Read-only queries go straight to `engine()`.
pub struct QuizService {
    engine: QuizEngine,
    store: Arc<dyn KeyValueRepository>,
}

impl QuizService {
    /// Restore progress from `store`, or start fresh if nothing usable is stored.
    ///
    /// The (possibly repaired) state is written back immediately.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the store cannot be read or written.
    pub async fn load(
        bank: Arc<QuestionBank>,
        store: Arc<dyn KeyValueRepository>,
    ) -> Result<Self, QuizServiceError> {
        let engine = match store.get(StoreKey::QuizState).await? {
            Some(raw) => QuizEngine::restore(bank, &raw),
            None => {
                info!("no saved quiz progress; starting fresh");
                QuizEngine::new(bank)
            }
        };
        Self::with_engine(engine, store).await
    }

    /// Wrap an existing engine and persist its state.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the initial write fails.
    pub async fn with_engine(
        engine: QuizEngine,
        store: Arc<dyn KeyValueRepository>,
    ) -> Result<Self, QuizServiceError> {
        let service = Self { engine, store };
        service.persist().await?;
        Ok(service)
    }

    #[must_use]
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    async fn persist(&self) -> Result<(), QuizServiceError> {
        let raw = self.engine.to_persisted()?;
        self.store.put(StoreKey::QuizState, &raw).await?;
        debug!(bytes = raw.len(), "quiz state saved");
        Ok(())
    }

    async fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut QuizEngine) -> T,
    ) -> Result<T, QuizServiceError> {
        let out = op(&mut self.engine);
        self.persist().await?;
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn select_answer(
        &mut self,
        id: QuestionId,
        label: &str,
    ) -> Result<bool, QuizServiceError> {
        self.apply(|engine| engine.select_answer(id, label)).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn confirm_answer(
        &mut self,
        id: QuestionId,
    ) -> Result<ConfirmOutcome, QuizServiceError> {
        self.apply(|engine| engine.confirm_answer(id)).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn advance(&mut self) -> Result<(), QuizServiceError> {
        self.apply(QuizEngine::advance).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn retreat(&mut self) -> Result<(), QuizServiceError> {
        self.apply(QuizEngine::retreat).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn jump_to_index(&mut self, index: usize) -> Result<(), QuizServiceError> {
        self.apply(|engine| engine.jump_to_index(index)).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn jump_to_question_id(&mut self, id: QuestionId) -> Result<(), QuizServiceError> {
        self.apply(|engine| engine.jump_to_question_id(id)).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn finish(&mut self) -> Result<(), QuizServiceError> {
        self.apply(QuizEngine::finish).await
    }

    /// Finish if everything is confirmed, otherwise report what is left.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn request_finish(&mut self) -> Result<FinishOutcome, QuizServiceError> {
        self.apply(QuizEngine::request_finish).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn review_first_unanswered(
        &mut self,
    ) -> Result<Option<QuestionId>, QuizServiceError> {
        self.apply(QuizEngine::review_first_unanswered).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn set_review_mode(&mut self, enabled: bool) -> Result<(), QuizServiceError> {
        self.apply(|engine| engine.set_review_mode(enabled)).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn reset(&mut self) -> Result<(), QuizServiceError> {
        self.apply(QuizEngine::reset).await
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError` if the state cannot be saved.
    pub async fn set_randomization(&mut self, enabled: bool) -> Result<(), QuizServiceError> {
        self.apply(|engine| engine.set_randomization(enabled)).await
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.engine.score()
    }

    #[must_use]
    pub fn list_unanswered(&self) -> Vec<QuestionId> {
        self.engine.list_unanswered()
    }
}
