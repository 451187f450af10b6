#![forbid(unsafe_code)]

pub mod engine;
pub mod model;
pub mod shuffle;
pub mod time;

pub use engine::{
    ConfirmOutcome, FinishOutcome, QuestionStatus, QuestionView, QuizEngine, ReviewItem,
};
pub use time::Clock;
