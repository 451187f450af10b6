use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quiz_core::model::{ChatMessage, ChatSettings, QuestionContext};

use crate::error::ChatError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an instructor helping a student prepare for a \
multiple-choice certification exam. Explain why the correct option is right, explain what is \
wrong with each other option, and close with the key concept the question tests. Stay on the \
subject of the exam and decline unrelated questions politely.";

/// One round trip to a chat model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Ask for the next assistant reply to `messages` about `context`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` when the request cannot be made or the reply is unusable.
    async fn complete(
        &self,
        settings: &ChatSettings,
        context: &QuestionContext,
        messages: &[ChatMessage],
    ) -> Result<String, ChatError>;
}

/// Client for an OpenAI-compatible `chat/completions` endpoint (OpenRouter by default).
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    app_title: String,
}

impl OpenRouterClient {
    #[must_use]
    pub fn new(app_title: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            app_title: app_title.into(),
        }
    }

    /// Build the HTTP request without sending it.
    fn prepare(
        &self,
        settings: &ChatSettings,
        context: &QuestionContext,
        messages: &[ChatMessage],
    ) -> Result<Request, ChatError> {
        let api_key = settings.api_key().ok_or(ChatError::MissingApiKey)?;
        let url = format!(
            "{}/chat/completions",
            settings.effective_base_url().trim_end_matches('/')
        );
        let payload = build_request(settings, context, messages);
        debug!(model = payload.model, turns = messages.len(), "sending chat request");

        Ok(self
            .client
            .post(url)
            .bearer_auth(api_key)
            .header("X-Title", &self.app_title)
            .json(&payload)
            .build()?)
    }
}

#[async_trait]
impl ChatCompletion for OpenRouterClient {
    async fn complete(
        &self,
        settings: &ChatSettings,
        context: &QuestionContext,
        messages: &[ChatMessage],
    ) -> Result<String, ChatError> {
        let request = self.prepare(settings, context, messages)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ChatError::InvalidApiKey);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "chat API error");
            return Err(ChatError::HttpStatus(status));
        }

        let body: ChatResponse = response.json().await?;
        extract_reply(body)
    }
}

fn build_request<'a>(
    settings: &'a ChatSettings,
    context: &QuestionContext,
    messages: &'a [ChatMessage],
) -> ChatRequest<'a> {
    let prompt = settings
        .ai_system_prompt()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let mut wire = Vec::with_capacity(messages.len() + 1);
    wire.push(WireMessage {
        role: "system",
        content: format!(
            "{prompt}\n\n**Current question context:**\n{}",
            context.as_str()
        ),
    });
    wire.extend(messages.iter().map(|m| WireMessage {
        role: m.role.as_str(),
        content: m.content.clone(),
    }));

    ChatRequest {
        model: settings.effective_model(),
        messages: wire,
        reasoning: Reasoning { enabled: true },
    }
}

fn extract_reply(body: ChatResponse) -> Result<String, ChatError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ChatError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    reasoning: Reasoning,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerOption, ChatSettingsDraft, QuestionDraft};

    fn context() -> QuestionContext {
        let question = QuestionDraft {
            id: 1,
            text: "What is grounding?".into(),
            options: vec![AnswerOption::new("A", "x"), AnswerOption::new("B", "y")],
            correct_answer: "A".into(),
            tip: None,
            title: None,
        }
        .validate()
        .unwrap();
        QuestionContext::describe(&question, Some("B"))
    }

    #[test]
    fn request_starts_with_system_prompt_and_context() {
        let settings = ChatSettings::default();
        let history = vec![ChatMessage::user("why not B?", 1)];
        let ctx = context();
        let request = build_request(&settings, &ctx, &history);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], quiz_core::model::DEFAULT_CHAT_MODEL);
        assert_eq!(json["reasoning"]["enabled"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        let system = json["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(system.contains("**User's answer:** B"));
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "why not B?");
    }

    #[test]
    fn custom_prompt_and_model_are_used() {
        let settings = ChatSettingsDraft {
            api_model: Some("my/model".into()),
            ai_system_prompt: Some("Be brief.".into()),
            ..ChatSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let ctx = context();
        let request = build_request(&settings, &ctx, &[]);
        assert_eq!(request.model, "my/model");
        assert!(request.messages[0].content.starts_with("Be brief."));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn prepared_request_carries_auth_and_title() {
        let settings = ChatSettingsDraft {
            api_key: Some("sk-test".into()),
            api_base_url: Some("https://example.test/api/v1/".into()),
            ..ChatSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let client = OpenRouterClient::new("Quiz Prep");
        let request = client
            .prepare(&settings, &context(), &[ChatMessage::user("hi", 1)])
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://example.test/api/v1/chat/completions"
        );
        let headers = request.headers();
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(headers["x-title"], "Quiz Prep");
        assert_eq!(headers["content-type"], "application/json");
        assert!(headers.get("http-referer").is_none());
    }

    #[test]
    fn prepare_without_key_is_rejected() {
        let client = OpenRouterClient::new("Quiz Prep");
        let err = client
            .prepare(&ChatSettings::default(), &context(), &[])
            .unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
    }

    #[test]
    fn empty_choices_are_an_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_reply(body), Err(ChatError::EmptyResponse)));

        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  "}}]}"#).unwrap();
        assert!(matches!(extract_reply(body), Err(ChatError::EmptyResponse)));
    }

    #[test]
    fn reply_is_trimmed() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": " A is right. "}}]}"#)
                .unwrap();
        assert_eq!(extract_reply(body).unwrap(), "A is right.");
    }
}
