use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use assess_core::model::QuizId;
use services::{
    EngineConfig, HttpInitiationService, InitiationService, ScriptedEnvironment, SessionLauncher,
    StaticInitiationService, SubmissionCoordinator,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod replay;

use replay::Script;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingScript,
    UnknownArg(String),
    InvalidQuizId { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingScript => write!(f, "replay requires a script path"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- replay <script.json> [--db <sqlite_url>] [--offline]");
    eprintln!("  cargo run -p app -- history --quiz-id <id> [--db <sqlite_url>] [--limit <n>]");
    eprintln!();
    eprintln!("Without --db, attempts and drafts live in memory for the run.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_API_BASE_URL, ASSESS_API_TOKEN, ASSESS_SUBMIT_TIMEOUT_SECS,");
    eprintln!("  ASSESS_TEXT_MATCH, ASSESS_DB_URL, RUST_LOG");
}

enum Command {
    Replay {
        script: PathBuf,
        offline: bool,
    },
    History {
        quiz_id: QuizId,
        limit: u32,
    },
}

struct Args {
    command: Command,
    db_url: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(sub) = args.next() else {
            return Ok(None);
        };

        let mut db_url = None;
        let mut script = None;
        let mut offline = false;
        let mut quiz_id = None;
        let mut limit = 20_u32;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                }
                "--offline" => offline = true,
                "--quiz-id" => {
                    let value = require_value(&mut args, "--quiz-id")?;
                    let parsed: QuizId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidQuizId { raw: value.clone() })?;
                    quiz_id = Some(parsed);
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => return Ok(None),
                other if !other.starts_with("--") && script.is_none() => {
                    script = Some(PathBuf::from(other));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match sub.as_str() {
            "replay" => Command::Replay {
                script: script.ok_or(ArgsError::MissingScript)?,
                offline,
            },
            "history" => Command::History {
                quiz_id: quiz_id.ok_or(ArgsError::MissingValue { flag: "--quiz-id" })?,
                limit,
            },
            "--help" | "-h" => return Ok(None),
            _ => return Err(ArgsError::UnknownArg(sub)),
        };
        Ok(Some(Self { command, db_url }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite::memory:") || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
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
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
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

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };

    let mut config = EngineConfig::from_env()?;
    if let Some(db_url) = args.db_url {
        config = config.with_database_url(db_url);
    }
    if let Some(db_url) = &config.database_url {
        prepare_sqlite_file(db_url)?;
    }
    let storage = SessionLauncher::storage_for(&config).await?;

    match args.command {
        Command::Replay { script, offline } => {
            let script = Script::from_path(&script)?;
            if offline {
                config.api_base_url = None;
            }

            let initiation: Arc<dyn InitiationService> = match &script.quiz {
                Some(bundle) => Arc::new(
                    StaticInitiationService::new()
                        .with_quiz(bundle.clone().into_quiz(script.quiz_id)?),
                ),
                None => Arc::new(HttpInitiationService::from_config(&config)),
            };
            let environment = Arc::new(ScriptedEnvironment::new());
            let launcher = SessionLauncher::new(
                initiation,
                SubmissionCoordinator::from_config(&config),
                storage,
                environment.clone(),
            );

            let launched = launcher.launch(script.quiz_id).await?;
            let outcome = replay::replay(&script, &launched, &environment).await?;
            println!("attempt {}", outcome.attempt_id);
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
            Ok(())
        }
        Command::History { quiz_id, limit } => {
            let rows = storage.attempts.list_attempts(quiz_id, limit).await?;
            for row in rows {
                let r = &row.result;
                println!(
                    "#{} {} {}/{} incidents={} elapsed={}s {}{}",
                    row.id,
                    r.completed_at.to_rfc3339(),
                    r.points_earned,
                    r.points_possible,
                    r.incident_count,
                    r.elapsed_seconds,
                    r.provenance.as_str(),
                    if r.expired { " expired" } else { "" },
                );
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
