mod client;
mod service;

pub use client::{ChatCompletion, DEFAULT_SYSTEM_PROMPT, OpenRouterClient};
pub use service::ChatService;
