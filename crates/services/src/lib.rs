#![forbid(unsafe_code)]

pub mod app_services;
pub mod chat;
pub mod error;
pub mod quiz_service;
pub mod settings_service;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use chat::{ChatCompletion, ChatService, OpenRouterClient};
pub use error::{AppServicesError, ChatError, QuizServiceError, SettingsServiceError};
pub use quiz_service::QuizService;
pub use settings_service::SettingsService;
