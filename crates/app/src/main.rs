use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use quiz_core::model::{QuestionContext, QuestionId, ScoreBand};
use quiz_core::{FinishOutcome, QuestionStatus};
use services::{AppServices, Clock};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
    UnreadableBank { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::UnreadableBank { path, source } => {
                write!(f, "cannot read question bank {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Parser)]
#[command(name = "quiz")]
#[command(about = "Multiple-choice exam practice with saved progress")]
struct Cli {
    /// SQLite database holding progress, chat history and settings
    #[arg(long, env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    db: String,

    /// Question bank JSON file
    #[arg(long, env = "QUIZ_BANK_PATH", default_value = "data/sample_bank.json")]
    bank: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current question (default)
    Status,
    /// Select an option on the current question, or on `--id`
    Select {
        label: String,
        #[arg(long)]
        id: Option<u64>,
    },
    /// Confirm the answer on the current question, or on `--id`
    Confirm {
        #[arg(long)]
        id: Option<u64>,
    },
    Next,
    Prev,
    /// Jump to a 1-based position in the current order
    Goto { position: usize },
    /// Jump to a question by its ID
    GotoId { id: u64 },
    /// Show results, or list unconfirmed questions first unless `--force`
    Finish {
        #[arg(long)]
        force: bool,
    },
    /// Start over, keeping the randomization setting
    Reset,
    Randomize { mode: Toggle },
    ReviewMode { mode: Toggle },
    Score,
    /// List every question with its status, or full answers after finishing
    Review,
    /// Ask the chat assistant about the current question
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Print the chat transcript for the current question
    History,
    ChatClear,
    SetKey { key: String },
    ClearKey,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn read_bank(path: &Path) -> Result<String, ArgsError> {
    std::fs::read_to_string(path).map_err(|source| ArgsError::UnreadableBank {
        path: path.to_path_buf(),
        source,
    })
}

fn print_current(app: &AppServices) {
    let engine = app.quiz().engine();
    let view = engine.current_question();
    let question = view.question;

    println!(
        "Question {} of {}  (id {}, {} confirmed)",
        engine.current_index() + 1,
        engine.total_questions(),
        question.id(),
        engine.confirmed_count()
    );
    if let Some(title) = question.title() {
        println!("[{title}]");
    }
    println!("{}", question.text());
    let selected = engine.answer_for(question.id());
    for option in &view.options {
        let marker = if selected == Some(option.label.as_str()) {
            '*'
        } else {
            ' '
        };
        println!(" {marker} {}: {}", option.label, option.text);
    }
    if engine.is_answer_confirmed(question.id()) {
        println!("(confirmed)");
        if let Some(tip) = question.tip() {
            println!("Tip: {tip}");
        }
    }
}

fn print_score(app: &AppServices) {
    let score = app.quiz().score();
    let band = match score.band() {
        ScoreBand::Excellent => "Excellent",
        ScoreBand::Good => "Good",
        ScoreBand::NeedsPractice => "Needs practice",
    };
    println!(
        "{}/{} correct ({}%) - {band}",
        score.correct(),
        score.total(),
        score.percentage()
    );
}

fn print_review(app: &AppServices) {
    let engine = app.quiz().engine();
    if engine.show_results() {
        for item in engine.review_items() {
            let verdict = if item.is_correct { "correct" } else { "wrong" };
            println!(
                "#{} {}: your answer {}, correct {} ({verdict})",
                item.question.id(),
                item.question.text(),
                item.user_answer.unwrap_or("-"),
                item.question.correct_answer()
            );
        }
        return;
    }

    for (position, (id, status)) in engine.question_statuses().into_iter().enumerate() {
        let status = match status {
            QuestionStatus::Unanswered => "unanswered",
            QuestionStatus::Selected => "selected",
            QuestionStatus::Confirmed => "confirmed",
            QuestionStatus::Correct => "correct",
            QuestionStatus::Incorrect => "incorrect",
        };
        println!("{:>3}. id {id}: {status}", position + 1);
    }
}

fn current_context(app: &AppServices) -> (QuestionId, QuestionContext) {
    let engine = app.quiz().engine();
    let question = engine.current_question().question;
    let id = question.id();
    (id, QuestionContext::describe(question, engine.answer_for(id)))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_file(&db_url)?;

    let bank_json = read_bank(&cli.bank)?;
    let mut app = AppServices::open(&db_url, &bank_json, Clock::default()).await?;
    info!(bank = %cli.bank.display(), questions = app.bank().len(), "question bank loaded");

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => print_current(&app),
        Command::Select { label, id } => {
            let id = id.map_or_else(|| current_context(&app).0, QuestionId::new);
            if !app.quiz_mut().select_answer(id, &label).await? {
                eprintln!("no option {label} on question {id}");
            }
            print_current(&app);
        }
        Command::Confirm { id } => {
            let id = id.map_or_else(|| current_context(&app).0, QuestionId::new);
            let outcome = app.quiz_mut().confirm_answer(id).await?;
            println!("{outcome:?}");
            print_current(&app);
        }
        Command::Next => {
            app.quiz_mut().advance().await?;
            print_current(&app);
        }
        Command::Prev => {
            app.quiz_mut().retreat().await?;
            print_current(&app);
        }
        Command::Goto { position } => {
            app.quiz_mut()
                .jump_to_index(position.saturating_sub(1))
                .await?;
            print_current(&app);
        }
        Command::GotoId { id } => {
            app.quiz_mut()
                .jump_to_question_id(QuestionId::new(id))
                .await?;
            print_current(&app);
        }
        Command::Finish { force } => {
            if force {
                app.quiz_mut().finish().await?;
                print_score(&app);
            } else {
                match app.quiz_mut().request_finish().await? {
                    FinishOutcome::Finished => print_score(&app),
                    FinishOutcome::NeedsReview { unanswered } => {
                        let ids: Vec<String> = unanswered.iter().map(ToString::to_string).collect();
                        println!("Unconfirmed questions: {}", ids.join(", "));
                        app.quiz_mut().review_first_unanswered().await?;
                        print_current(&app);
                    }
                }
            }
        }
        Command::Reset => {
            app.quiz_mut().reset().await?;
            print_current(&app);
        }
        Command::Randomize { mode } => {
            app.quiz_mut().set_randomization(mode.enabled()).await?;
            print_current(&app);
        }
        Command::ReviewMode { mode } => {
            app.quiz_mut().set_review_mode(mode.enabled()).await?;
        }
        Command::Score => print_score(&app),
        Command::Review => print_review(&app),
        Command::Ask { message } => {
            let (id, context) = current_context(&app);
            let reply = app
                .chat()
                .send_message(id, &context, &message.join(" "))
                .await?;
            if let Some(reply) = reply {
                println!("{}", reply.content);
            }
        }
        Command::History => {
            let (id, _) = current_context(&app);
            for message in app.chat().history(id).await? {
                println!("{}: {}", message.role.as_str(), message.content);
            }
        }
        Command::ChatClear => {
            let (id, _) = current_context(&app);
            app.chat().clear_history(id).await?;
        }
        Command::SetKey { key } => {
            app.settings().set_api_key(&key).await?;
            println!("API key saved");
        }
        Command::ClearKey => {
            app.settings().clear_api_key().await?;
            println!("API key removed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_and_full_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url(" sqlite:///tmp/q.sqlite3 "),
            "sqlite:///tmp/q.sqlite3"
        );
    }

    #[test]
    fn bare_paths_become_absolute_urls() {
        assert_eq!(
            normalize_sqlite_url("sqlite:/var/lib/quiz.db"),
            "sqlite:///var/lib/quiz.db"
        );
        assert!(normalize_sqlite_url("quiz.db").starts_with("sqlite:///"));
    }

    #[test]
    fn cli_defaults_to_status() {
        let cli = Cli::try_parse_from(["quiz", "--bank", "bank.json"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["quiz", "randomize", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Randomize { mode: Toggle::On })
        ));
    }
}
