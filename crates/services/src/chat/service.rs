use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use quiz_core::Clock;
use quiz_core::model::{ChatMessage, QuestionContext, QuestionId};
use storage::repository::{KeyValueRepository, StoreKey};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::client::ChatCompletion;
use crate::error::ChatError;
use crate::settings_service::SettingsService;

type Transcripts = BTreeMap<QuestionId, Vec<ChatMessage>>;

/// Per-question conversations with the chat assistant.
///
/// Transcripts live under `StoreKey::ChatHistory`, separate from quiz state;
/// nothing here reads or writes quiz progress. All transcripts share one
/// stored blob, so every read-modify-write holds `write_lock`.
pub struct ChatService {
    clock: Clock,
    store: Arc<dyn KeyValueRepository>,
    settings: Arc<SettingsService>,
    completion: Arc<dyn ChatCompletion>,
    in_flight: Mutex<HashSet<QuestionId>>,
    write_lock: AsyncMutex<()>,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: Arc<dyn KeyValueRepository>,
        settings: Arc<SettingsService>,
        completion: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            clock,
            store,
            settings,
            completion,
            in_flight: Mutex::new(HashSet::new()),
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Messages exchanged so far about `id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the store cannot be read.
    pub async fn history(&self, id: QuestionId) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.load_all().await?.remove(&id).unwrap_or_default())
    }

    /// Send `content` about question `id` and return the assistant's reply.
    ///
    /// Blank input is ignored (`Ok(None)`). The user's message is stored
    /// before the request goes out and stays stored if the request fails.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::MissingApiKey` before anything is stored when no key
    /// is configured, `ChatError::Busy` while another reply for `id` is
    /// pending, and request or storage errors otherwise.
    pub async fn send_message(
        &self,
        id: QuestionId,
        context: &QuestionContext,
        content: &str,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let settings = self.settings.effective().await?;
        if !settings.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }

        let _guard = InFlight::acquire(&self.in_flight, id)?;

        let user = ChatMessage::user(content, self.clock.now_millis());
        let transcript = self.append(id, user).await?;

        debug!(%id, turns = transcript.len(), "asking chat assistant");
        let reply = self
            .completion
            .complete(&settings, context, &transcript)
            .await
            .inspect_err(|err| warn!(%id, error = %err, "chat request failed"))?;

        let assistant = ChatMessage::assistant(reply, self.clock.now_millis());
        self.append(id, assistant.clone()).await?;
        Ok(Some(assistant))
    }

    /// Forget the conversation about `id`.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` if the store cannot be read or written.
    pub async fn clear_history(&self, id: QuestionId) -> Result<(), ChatError> {
        let _write = self.write_lock.lock().await;
        let mut all = self.load_all().await?;
        if all.remove(&id).is_some() {
            self.save_all(&all).await?;
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Transcripts, ChatError> {
        let Some(raw) = self.store.get(StoreKey::ChatHistory).await? else {
            return Ok(Transcripts::new());
        };
        match serde_json::from_str(&raw) {
            Ok(all) => Ok(all),
            Err(err) => {
                warn!(error = %err, "discarding unreadable chat history");
                Ok(Transcripts::new())
            }
        }
    }

    async fn save_all(&self, all: &Transcripts) -> Result<(), ChatError> {
        let raw = serde_json::to_string(all)?;
        self.store.put(StoreKey::ChatHistory, &raw).await?;
        Ok(())
    }

    /// Re-read, append, write back. Returns the updated transcript for `id`.
    async fn append(
        &self,
        id: QuestionId,
        message: ChatMessage,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let _write = self.write_lock.lock().await;
        let mut all = self.load_all().await?;
        let transcript = all.entry(id).or_default();
        transcript.push(message);
        let snapshot = transcript.clone();
        self.save_all(&all).await?;
        Ok(snapshot)
    }
}

/// Marks a question as having a request outstanding until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<QuestionId>>,
    id: QuestionId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<QuestionId>>, id: QuestionId) -> Result<Self, ChatError> {
        let mut guard = set.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !guard.insert(id) {
            return Err(ChatError::Busy(id));
        }
        Ok(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = self
            .set
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove(&self.id);
    }
}
