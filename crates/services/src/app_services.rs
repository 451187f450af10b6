use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{ChatSettings, ChatSettingsError, QuestionBank};
use storage::repository::Storage;
use tracing::info;

use crate::chat::{ChatCompletion, ChatService, OpenRouterClient};
use crate::error::AppServicesError;
use crate::quiz_service::QuizService;
use crate::settings_service::SettingsService;

const APP_TITLE: &str = "Quiz Prep";

/// Everything a front end needs, wired against one storage backend.
pub struct AppServices {
    bank: Arc<QuestionBank>,
    quiz: QuizService,
    chat: Arc<ChatService>,
    settings: Arc<SettingsService>,
}

impl AppServices {
    /// Parse `bank_json`, read `QUIZ_AI_*` overrides from the environment and
    /// open `SQLite` storage at `db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Bank` for an invalid bank,
    /// `AppServicesError::Settings` for invalid overrides, and storage or
    /// state errors otherwise.
    pub async fn open(
        db_url: &str,
        bank_json: &str,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let (bank, overrides) = Self::prepare_inputs(bank_json, SettingsService::env_overrides)?;
        Self::new_sqlite(db_url, bank, clock, overrides).await
    }

    /// Validate the bank and the overrides before any storage is touched.
    fn prepare_inputs(
        bank_json: &str,
        overrides: impl FnOnce() -> Result<ChatSettings, ChatSettingsError>,
    ) -> Result<(Arc<QuestionBank>, ChatSettings), AppServicesError> {
        let bank = Arc::new(QuestionBank::from_json(bank_json)?);
        let overrides = overrides()?;
        Ok((bank, overrides))
    }

    /// Build services backed by `SQLite` storage, using the real chat client.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or state loading fails.
    pub async fn new_sqlite(
        db_url: &str,
        bank: Arc<QuestionBank>,
        clock: Clock,
        overrides: ChatSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let completion: Arc<dyn ChatCompletion> = Arc::new(OpenRouterClient::new(APP_TITLE));
        Self::assemble(storage, bank, clock, overrides, completion).await
    }

    /// Build services over an arbitrary storage backend and chat client.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the saved quiz state cannot be loaded or written back.
    pub async fn assemble(
        storage: Storage,
        bank: Arc<QuestionBank>,
        clock: Clock,
        overrides: ChatSettings,
        completion: Arc<dyn ChatCompletion>,
    ) -> Result<Self, AppServicesError> {
        let settings = Arc::new(
            SettingsService::new(Arc::clone(&storage.kv)).with_overrides(overrides),
        );
        let quiz = QuizService::load(Arc::clone(&bank), Arc::clone(&storage.kv)).await?;
        let chat = Arc::new(ChatService::new(
            clock,
            Arc::clone(&storage.kv),
            Arc::clone(&settings),
            completion,
        ));
        info!(questions = bank.len(), "services ready");

        Ok(Self {
            bank,
            quiz,
            chat,
            settings,
        })
    }

    #[must_use]
    pub fn bank(&self) -> Arc<QuestionBank> {
        Arc::clone(&self.bank)
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizService {
        &self.quiz
    }

    pub fn quiz_mut(&mut self) -> &mut QuizService {
        &mut self.quiz
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }
}
