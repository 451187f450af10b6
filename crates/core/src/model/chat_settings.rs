use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_CHAT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "xiaomi/mimo-v2-flash:free";

/// Credentials and endpoint for the chat assistant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    api_key: Option<String>,
    api_model: Option<String>,
    api_base_url: Option<String>,
    ai_system_prompt: Option<String>,
}

/// Raw settings as typed by the user or read back from storage.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettingsDraft {
    pub api_key: Option<String>,
    pub api_model: Option<String>,
    pub api_base_url: Option<String>,
    pub ai_system_prompt: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChatSettingsError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("malformed chat settings: {0}")]
    Malformed(String),
}

impl ChatSettingsDraft {
    /// Trim every field, drop blanks, and check the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ChatSettingsError::InvalidBaseUrl` if a base URL is present but unparsable.
    pub fn validate(self) -> Result<ChatSettings, ChatSettingsError> {
        let api_base_url = normalize_optional(self.api_base_url);
        if let Some(url) = api_base_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(ChatSettingsError::InvalidBaseUrl(url.clone()));
            }
        }

        Ok(ChatSettings {
            api_key: normalize_optional(self.api_key),
            api_model: normalize_optional(self.api_model),
            api_base_url,
            ai_system_prompt: normalize_optional(self.ai_system_prompt),
        })
    }
}

impl ChatSettings {
    /// Parse the persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ChatSettingsError::Malformed` for unparsable JSON, or a
    /// validation error if the stored base URL no longer parses.
    pub fn from_json(raw: &str) -> Result<Self, ChatSettingsError> {
        let draft: ChatSettingsDraft = serde_json::from_str(raw)
            .map_err(|err| ChatSettingsError::Malformed(err.to_string()))?;
        draft.validate()
    }

    #[must_use]
    pub fn to_draft(&self) -> ChatSettingsDraft {
        ChatSettingsDraft {
            api_key: self.api_key.clone(),
            api_model: self.api_model.clone(),
            api_base_url: self.api_base_url.clone(),
            ai_system_prompt: self.ai_system_prompt.clone(),
        }
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn api_model(&self) -> Option<&str> {
        self.api_model.as_deref()
    }

    #[must_use]
    pub fn api_base_url(&self) -> Option<&str> {
        self.api_base_url.as_deref()
    }

    #[must_use]
    pub fn ai_system_prompt(&self) -> Option<&str> {
        self.ai_system_prompt.as_deref()
    }

    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.api_model().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.api_base_url().unwrap_or(DEFAULT_CHAT_BASE_URL)
    }

    /// Layer `overrides` on top of `self`, field by field.
    #[must_use]
    pub fn overlay(&self, overrides: &ChatSettings) -> ChatSettings {
        ChatSettings {
            api_key: overrides.api_key.clone().or_else(|| self.api_key.clone()),
            api_model: overrides.api_model.clone().or_else(|| self.api_model.clone()),
            api_base_url: overrides
                .api_base_url
                .clone()
                .or_else(|| self.api_base_url.clone()),
            ai_system_prompt: overrides
                .ai_system_prompt
                .clone()
                .or_else(|| self.ai_system_prompt.clone()),
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
