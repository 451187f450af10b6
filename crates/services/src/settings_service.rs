use std::env;
use std::sync::Arc;

use quiz_core::model::{ChatSettings, ChatSettingsDraft, ChatSettingsError};
use storage::repository::{KeyValueRepository, StoreKey};
use tracing::warn;

use crate::error::SettingsServiceError;

/// Stored chat settings, optionally overlaid with process-level overrides.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn KeyValueRepository>,
    overrides: ChatSettings,
}

impl SettingsService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueRepository>) -> Self {
        Self {
            store,
            overrides: ChatSettings::default(),
        }
    }

    /// Values that win over stored settings for this process only.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ChatSettings) -> Self {
        self.overrides = overrides;
        self
    }

    /// Read `QUIZ_AI_API_KEY`, `QUIZ_AI_BASE_URL` and `QUIZ_AI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `ChatSettingsError` if `QUIZ_AI_BASE_URL` is set but invalid.
    pub fn env_overrides() -> Result<ChatSettings, ChatSettingsError> {
        Self::overrides_from(|name| env::var(name).ok())
    }

    /// Same as `env_overrides`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ChatSettingsError` if the base URL override is invalid.
    pub fn overrides_from(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ChatSettings, ChatSettingsError> {
        ChatSettingsDraft {
            api_key: lookup("QUIZ_AI_API_KEY"),
            api_model: lookup("QUIZ_AI_MODEL"),
            api_base_url: lookup("QUIZ_AI_BASE_URL"),
            ai_system_prompt: None,
        }
        .validate()
    }

    /// Load persisted settings (or defaults if missing or unreadable).
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn load(&self) -> Result<ChatSettings, SettingsServiceError> {
        let Some(raw) = self.store.get(StoreKey::ChatSettings).await? else {
            return Ok(ChatSettings::default());
        };
        match ChatSettings::from_json(&raw) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(error = %err, "discarding unreadable chat settings");
                Ok(ChatSettings::default())
            }
        }
    }

    /// Stored settings with overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn effective(&self) -> Result<ChatSettings, SettingsServiceError> {
        Ok(self.load().await?.overlay(&self.overrides))
    }

    /// Validate and persist new settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if validation or persistence fails.
    pub async fn save(
        &self,
        draft: ChatSettingsDraft,
    ) -> Result<ChatSettings, SettingsServiceError> {
        let settings = draft.validate()?;
        let raw = serde_json::to_string(&settings)?;
        self.store.put(StoreKey::ChatSettings, &raw).await?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns `SettingsServiceError` if persistence fails.
    pub async fn set_api_key(&self, key: &str) -> Result<ChatSettings, SettingsServiceError> {
        let mut draft = self.load().await?.to_draft();
        draft.api_key = Some(key.to_string());
        self.save(draft).await
    }

    /// # Errors
    ///
    /// Returns `SettingsServiceError` if persistence fails.
    pub async fn clear_api_key(&self) -> Result<ChatSettings, SettingsServiceError> {
        let mut draft = self.load().await?.to_draft();
        draft.api_key = None;
        self.save(draft).await
    }

    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn has_api_key(&self) -> Result<bool, SettingsServiceError> {
        Ok(self.effective().await?.has_api_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    fn service() -> (SettingsService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        (SettingsService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn missing_settings_load_as_default() {
        let (svc, _) = service();
        assert_eq!(svc.load().await.unwrap(), ChatSettings::default());
        assert!(!svc.has_api_key().await.unwrap());
    }

    #[tokio::test]
    async fn api_key_set_and_clear() {
        let (svc, _) = service();
        svc.set_api_key("  sk-test ").await.unwrap();
        assert_eq!(svc.load().await.unwrap().api_key(), Some("sk-test"));

        svc.clear_api_key().await.unwrap();
        assert!(!svc.has_api_key().await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_settings_fall_back_to_default() {
        let (svc, repo) = service();
        repo.put(StoreKey::ChatSettings, "[oops").await.unwrap();
        assert_eq!(svc.load().await.unwrap(), ChatSettings::default());
    }

    #[tokio::test]
    async fn overrides_win_without_being_stored() {
        let (svc, repo) = service();
        svc.set_api_key("stored").await.unwrap();
        let overrides = ChatSettingsDraft {
            api_key: Some("from-env".into()),
            ..ChatSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let svc = svc.with_overrides(overrides);

        assert_eq!(svc.effective().await.unwrap().api_key(), Some("from-env"));
        let raw = repo.get(StoreKey::ChatSettings).await.unwrap().unwrap();
        assert!(raw.contains("stored"));
        assert!(!raw.contains("from-env"));
    }

    #[test]
    fn overrides_read_the_quiz_ai_variables() {
        let overrides = SettingsService::overrides_from(|name| match name {
            "QUIZ_AI_API_KEY" => Some(" sk-env ".into()),
            "QUIZ_AI_MODEL" => Some("some/model".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(overrides.api_key(), Some("sk-env"));
        assert_eq!(overrides.effective_model(), "some/model");

        let err = SettingsService::overrides_from(|name| {
            (name == "QUIZ_AI_BASE_URL").then(|| "not a url".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ChatSettingsError::InvalidBaseUrl(_)));
    }

    #[tokio::test]
    async fn save_rejects_bad_base_url() {
        let (svc, _) = service();
        let err = svc
            .save(ChatSettingsDraft {
                api_base_url: Some("::".into()),
                ..ChatSettingsDraft::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsServiceError::Invalid(_)));
    }
}
