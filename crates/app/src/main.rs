use std::fmt;
use std::path::{Path, PathBuf};

use quiz_core::model::{
    CategoryId, Difficulty, Profile, Question, QuestionType, QuizResult, QuizSettings, Submission,
    UserId,
};
use services::{Clock, QuizLoopService, QuizRequest, RunnerError, SessionError, SessionEvent};
use storage::repository::{Storage, StorageError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

//
// ─── ARGS ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidDifficulty { raw: String },
    InvalidCategory { raw: String },
    InvalidCount { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => {
                write!(f, "invalid --user value (expected UUID): {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => write!(
                f,
                "invalid --difficulty value (easy, medium, hard, expert): {raw}"
            ),
            ArgsError::InvalidCategory { raw } => write!(f, "invalid --category value: {raw}"),
            ArgsError::InvalidCount { raw } => {
                write!(f, "invalid --count value (expected a positive number): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    user_id: Option<UserId>,
    request: QuizRequest,
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let db_url = std::env::var("QUIZ_DB_URL").ok();
        let user_id = std::env::var("QUIZ_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        Self::parse_from(std::env::args().skip(1), db_url, user_id)
    }

    fn parse_from(
        mut args: impl Iterator<Item = String>,
        env_db_url: Option<String>,
        env_user_id: Option<UserId>,
    ) -> Result<Self, ArgsError> {
        let mut db_url =
            env_db_url.map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut user_id = env_user_id;
        let mut request = QuizRequest::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--difficulty" => {
                    let value = require_value(&mut args, "--difficulty")?;
                    let parsed = value
                        .parse::<Difficulty>()
                        .map_err(|_| ArgsError::InvalidDifficulty { raw: value.clone() })?;
                    request.difficulty = Some(parsed);
                }
                "--category" => {
                    let value = require_value(&mut args, "--category")?;
                    let parsed = value
                        .parse::<CategoryId>()
                        .map_err(|_| ArgsError::InvalidCategory { raw: value.clone() })?;
                    request.category = Some(parsed);
                }
                "--count" => {
                    let value = require_value(&mut args, "--count")?;
                    let parsed = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ArgsError::InvalidCount { raw: value.clone() })?;
                    request.count = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            request,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://dev.sqlite3)");
    eprintln!("  --user <uuid>             Player id (default: a fresh id per run)");
    eprintln!("  --difficulty <level>      easy | medium | hard | expert");
    eprintln!("  --category <id>           Only ask questions from this category");
    eprintln!("  --count <n>               Number of questions (default depends on difficulty)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_LOG_JSON, RUST_LOG");
    eprintln!();
    eprintln!("Type :quit during a question to abandon the session.");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim();
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
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // In-memory and `sqlite:file:` URLs manage themselves.
        return Ok(());
    };
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

//
// ─── LOGGING ───────────────────────────────────────────────────────────────────
//

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the quiz itself.
    if env_bool("QUIZ_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

//
// ─── TERMINAL PLAY ─────────────────────────────────────────────────────────────
//

fn parse_submission(question: &Question, raw: &str) -> Submission {
    let trimmed = raw.trim();
    match question.question_type() {
        QuestionType::MultipleChoice => trimmed
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map_or_else(|| Submission::text(trimmed), Submission::Choice),
        QuestionType::TrueFalse => match trimmed.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" => Submission::Bool(true),
            "f" | "false" | "n" | "no" => Submission::Bool(false),
            _ => Submission::text(trimmed),
        },
        QuestionType::TextInput => Submission::text(raw),
    }
}

fn print_question(slot: usize, total: usize, question: &Question) {
    println!();
    println!(
        "[{}/{}] {} ({}s, {} pts)",
        slot + 1,
        total,
        question.prompt(),
        question.time_limit(),
        question.points()
    );
    match question.question_type() {
        QuestionType::MultipleChoice => {
            for (i, option) in question.options().iter().enumerate() {
                println!("  {}) {option}", i + 1);
            }
        }
        QuestionType::TrueFalse => println!("  (t)rue / (f)alse"),
        QuestionType::TextInput => println!("  type your answer"),
    }
}

fn print_result(result: &QuizResult, profile: Option<&Profile>) {
    println!();
    println!("{}", result.performance().label());
    println!(
        "Score {}% ({}/{} correct) in {}s, +{} points",
        result.score(),
        result.correct_answers(),
        result.total_questions(),
        result.total_time_secs(),
        result.total_points()
    );
    if let Some(profile) = profile {
        println!(
            "{}: {} points, level {}, {} games played",
            profile.username(),
            profile.total_points(),
            profile.current_level(),
            profile.games_played()
        );
    }
}

fn unsaved_notice(err: &SessionError) -> String {
    format!("Results not saved: {err}")
}

async fn ensure_profile(
    svc: &QuizLoopService,
    storage: &Storage,
    user_id: UserId,
) -> Result<Profile, Box<dyn std::error::Error>> {
    match svc.profile(user_id).await {
        Ok(profile) => Ok(profile),
        Err(SessionError::Storage(StorageError::NotFound)) => {
            let profile = Profile::new(user_id, "player")?;
            storage.profiles.upsert_profile(&profile).await?;
            info!(%user_id, "created profile");
            Ok(profile)
        }
        Err(err) => Err(err.into()),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;

    let svc = QuizLoopService::new(
        Clock::default(),
        QuizSettings::default(),
        storage.questions.clone(),
        storage.results.clone(),
        storage.profiles.clone(),
    );

    let user_id = args.user_id.unwrap_or_else(|| {
        let id = UserId::new(Uuid::new_v4());
        eprintln!("playing as {id} (pass --user {id} to keep your progress)");
        id
    });
    ensure_profile(&svc, &storage, user_id).await?;

    let session = svc.start_session(user_id, &args.request).await?;
    let questions: Vec<Question> = session.questions().to_vec();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (handle, task) = svc.spawn_runner(session, events_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut active: Option<usize> = None;
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(SessionEvent::QuestionStarted { slot, .. }) => {
                    active = Some(slot);
                    if let Some(question) = questions.get(slot) {
                        print_question(slot, questions.len(), question);
                    }
                }
                Some(SessionEvent::Tick { remaining, .. }) => {
                    if remaining <= 5 {
                        println!("  {remaining}s left");
                    }
                }
                Some(SessionEvent::AnswerRecorded(recorded)) => {
                    let verdict = if recorded.answer.is_correct() { "Correct!" } else { "Wrong." };
                    println!("{verdict}");
                }
                Some(SessionEvent::TimedOut(_)) => println!("Time's up!"),
                Some(SessionEvent::Completed(_) | SessionEvent::Abandoned) | None => break,
            },
            line = lines.next_line(), if input_open => match line? {
                // A closed runner has already finished; its final event is still queued.
                Some(line) if line.trim().eq_ignore_ascii_case(":quit") => {
                    handle.abandon().await.ok();
                }
                Some(line) => {
                    let Some(slot) = active else { continue };
                    let Some(question) = questions.get(slot) else { continue };
                    let submission = parse_submission(question, &line);
                    match handle.submit(slot, submission).await {
                        Ok(_) => {}
                        Err(RunnerError::Session(SessionError::AlreadyAnswered { .. })) => {
                            println!("Too late for that one.");
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                None => {
                    input_open = false;
                    handle.abandon().await.ok();
                }
            },
        }
    }

    drop(handle);
    let mut session = task.await?;
    if !session.is_complete() {
        println!("Session abandoned.");
        return Ok(());
    }

    let saved = svc.finalize_result(&mut session).await;
    if let Err(err) = &saved {
        warn!(error = %err, "could not save session result");
    }
    let profile = svc.profile(user_id).await.ok();
    if let Some(result) = session.result() {
        print_result(result, profile.as_ref());
    }
    if let Err(err) = saved {
        println!("{}", unsaved_notice(&err));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionDraft, QuestionId};

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    fn question(
        question_type: &str,
        options: Option<Vec<&str>>,
        correct: serde_json::Value,
    ) -> Question {
        QuestionDraft {
            id: QuestionId::new(1),
            prompt: "Q".into(),
            question_type: question_type.into(),
            category_id: CategoryId::new(1),
            difficulty: Difficulty::Easy,
            options: options.map(|o| o.into_iter().map(String::from).collect()),
            correct_answer: correct,
            explanation: String::new(),
            time_limit: None,
            points: None,
            image_url: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn flags_override_env() {
        let env_user = UserId::new(Uuid::new_v4());
        let flag_user = UserId::new(Uuid::new_v4());
        let parsed = Args::parse_from(
            args(&[
                "--db",
                "sqlite::memory:",
                "--user",
                &flag_user.to_string(),
                "--difficulty",
                "Hard",
                "--category",
                "4",
                "--count",
                "12",
            ]),
            Some("sqlite://elsewhere.db".into()),
            Some(env_user),
        )
        .unwrap();

        assert_eq!(parsed.db_url, "sqlite::memory:");
        assert_eq!(parsed.user_id, Some(flag_user));
        assert_eq!(parsed.request.difficulty, Some(Difficulty::Hard));
        assert_eq!(parsed.request.category, Some(CategoryId::new(4)));
        assert_eq!(parsed.request.count, Some(12));
    }

    #[test]
    fn env_values_apply_without_flags() {
        let env_user = UserId::new(Uuid::new_v4());
        let parsed =
            Args::parse_from(args(&[]), Some("sqlite://quiz.db".into()), Some(env_user)).unwrap();
        assert_eq!(parsed.db_url, "sqlite://quiz.db");
        assert_eq!(parsed.user_id, Some(env_user));
        assert_eq!(parsed.request, QuizRequest::default());
    }

    #[test]
    fn bad_flags_are_reported() {
        assert!(matches!(
            Args::parse_from(args(&["--count", "0"]), None, None),
            Err(ArgsError::InvalidCount { .. })
        ));
        assert!(matches!(
            Args::parse_from(args(&["--difficulty", "legendary"]), None, None),
            Err(ArgsError::InvalidDifficulty { .. })
        ));
        assert!(matches!(
            Args::parse_from(args(&["--user"]), None, None),
            Err(ArgsError::MissingValue { flag: "--user" })
        ));
        assert!(matches!(
            Args::parse_from(args(&["--verbose"]), None, None),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn failed_save_is_announced() {
        let err = SessionError::Persist {
            attempts: 3,
            source: StorageError::Connection("database is locked".into()),
        };
        let notice = unsaved_notice(&err);
        assert!(notice.starts_with("Results not saved"));
        assert!(notice.contains("after 3 attempt(s)"));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/quiz.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.db"));
    }

    #[test]
    fn terminal_input_maps_to_submissions() {
        let mc = question("multiple_choice", Some(vec!["a", "b"]), serde_json::json!(1));
        assert_eq!(parse_submission(&mc, "2"), Submission::Choice(1));
        assert_eq!(parse_submission(&mc, "0"), Submission::text("0"));

        let tf = question("true_false", None, serde_json::json!(true));
        assert_eq!(parse_submission(&tf, " Yes "), Submission::Bool(true));
        assert_eq!(parse_submission(&tf, "f"), Submission::Bool(false));

        let text = question("text_input", None, serde_json::json!("Nile"));
        assert_eq!(parse_submission(&text, " nile "), Submission::text(" nile "));
    }
}
