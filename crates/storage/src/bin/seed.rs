use std::fmt;

use quiz_core::model::{
    CategoryId, Difficulty, Profile, Question, QuestionDraft, QuestionId, UserId,
};
use serde_json::{Value, json};
use storage::repository::{Storage, StorageError};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: Option<UserId>,
    username: String,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut user_id = std::env::var("QUIZ_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        let mut username = std::env::var("QUIZ_USERNAME").unwrap_or_else(|_| "player".into());

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = Some(parsed);
                }
                "--username" => {
                    username = require_value(&mut args, "--username")?;
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
            username,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --user <uuid>             Create a profile for this player");
    eprintln!("  --username <name>         Username for the created profile (default: player)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_USERNAME");
}

struct Sample {
    category: u64,
    difficulty: Difficulty,
    question_type: &'static str,
    prompt: &'static str,
    options: Option<&'static [&'static str]>,
    correct: Value,
    explanation: &'static str,
}

fn samples() -> Vec<Sample> {
    vec![
        Sample {
            category: 1,
            difficulty: Difficulty::Easy,
            question_type: "multiple_choice",
            prompt: "What is the capital of Indonesia?",
            options: Some(&["Bandung", "Jakarta", "Surabaya", "Medan"]),
            correct: json!(1),
            explanation: "Jakarta has been the capital since independence.",
        },
        Sample {
            category: 1,
            difficulty: Difficulty::Easy,
            question_type: "true_false",
            prompt: "The Pacific is the largest ocean on Earth.",
            options: None,
            correct: json!(true),
            explanation: "It covers about a third of the planet's surface.",
        },
        Sample {
            category: 1,
            difficulty: Difficulty::Medium,
            question_type: "text_input",
            prompt: "Which river flows through Cairo?",
            options: None,
            correct: json!("Nile"),
            explanation: "Cairo sits on the banks of the Nile.",
        },
        Sample {
            category: 2,
            difficulty: Difficulty::Easy,
            question_type: "text_input",
            prompt: "What is 3 + 4?",
            options: None,
            correct: json!("7"),
            explanation: "Three plus four is seven.",
        },
        Sample {
            category: 2,
            difficulty: Difficulty::Medium,
            question_type: "multiple_choice",
            prompt: "Which of these numbers is prime?",
            options: Some(&["21", "27", "29", "33"]),
            correct: json!(2),
            explanation: "29 has no divisors other than 1 and itself.",
        },
        Sample {
            category: 2,
            difficulty: Difficulty::Hard,
            question_type: "true_false",
            prompt: "The square root of 2 is a rational number.",
            options: None,
            correct: json!(false),
            explanation: "Its irrationality was known to the ancient Greeks.",
        },
        Sample {
            category: 3,
            difficulty: Difficulty::Medium,
            question_type: "multiple_choice",
            prompt: "Which planet is known as the Red Planet?",
            options: Some(&["Venus", "Jupiter", "Mars", "Mercury"]),
            correct: json!(2),
            explanation: "Iron oxide gives Mars its colour.",
        },
        Sample {
            category: 3,
            difficulty: Difficulty::Hard,
            question_type: "text_input",
            prompt: "What is the chemical symbol for gold?",
            options: None,
            correct: json!("Au"),
            explanation: "From the Latin aurum.",
        },
        Sample {
            category: 3,
            difficulty: Difficulty::Expert,
            question_type: "true_false",
            prompt: "Light from the Sun reaches Earth in about eight minutes.",
            options: None,
            correct: json!(true),
            explanation: "Roughly 8 minutes and 20 seconds.",
        },
    ]
}

fn build_question(id: u64, sample: &Sample) -> Result<Question, quiz_core::Error> {
    let question = QuestionDraft {
        id: QuestionId::new(id),
        prompt: sample.prompt.to_owned(),
        question_type: sample.question_type.to_owned(),
        category_id: CategoryId::new(sample.category),
        difficulty: sample.difficulty,
        options: sample
            .options
            .map(|opts| opts.iter().map(|o| (*o).to_owned()).collect()),
        correct_answer: sample.correct.clone(),
        explanation: sample.explanation.to_owned(),
        time_limit: None,
        points: None,
        image_url: None,
    }
    .validate()?;
    Ok(question)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let samples = samples();
    for (i, sample) in samples.iter().enumerate() {
        let question = build_question(u64::try_from(i)? + 1, sample)?;
        storage.questions.upsert_question(&question).await?;
    }

    if let Some(user_id) = args.user_id {
        match storage.profiles.get_profile(user_id).await {
            Ok(_) => {}
            Err(StorageError::NotFound) => {
                let profile = Profile::new(user_id, args.username.clone())?;
                storage.profiles.upsert_profile(&profile).await?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!(
        "Seeded {} questions{} into {}",
        samples.len(),
        args.user_id
            .map(|id| format!(" and profile {id}"))
            .unwrap_or_default(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
