mod bank;
mod chat;
mod chat_settings;
mod ids;
mod question;
mod score;
pub(crate) mod state;

pub use bank::{BankError, QuestionBank};
pub use chat::{ChatMessage, ChatRole, QuestionContext};
pub use chat_settings::{
    ChatSettings, ChatSettingsDraft, ChatSettingsError, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL,
};
pub use ids::{ParseIdError, QuestionId};
pub use question::{AnswerOption, Question, QuestionDraft, QuestionError};
pub use score::{Score, ScoreBand};
pub use state::SessionState;
