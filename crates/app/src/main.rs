use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use quiz_core::model::{DocumentId, Quiz, TopicIdentity};
use services::{AppServices, BackendMode, Clock, ProgressBackend, SessionController, SessionError};
use tracing_subscriber::EnvFilter;

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDocumentId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidBackend { raw: String },
    MissingQuiz,
    MissingTopic,
    ConflictingTopic,
    InvalidTopic { raw: String },
    TopicNeedsLocalBackend { backend: BackendMode },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDocumentId { raw } => write!(f, "invalid --document value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBackend { raw } => write!(f, "invalid --backend value: {raw}"),
            ArgsError::MissingQuiz => write!(f, "play requires --quiz <file>"),
            ArgsError::MissingTopic => write!(f, "play requires --topic <name> or --document <id>"),
            ArgsError::ConflictingTopic => write!(f, "use either --topic or --document, not both"),
            ArgsError::InvalidTopic { raw } => write!(f, "invalid --topic value: {raw:?}"),
            ArgsError::TopicNeedsLocalBackend { backend } => write!(
                f,
                "--topic only works with the local backend; use --document <id> with {backend}"
            ),
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
    eprintln!("  cargo run -p app -- play  --quiz <file.json> --topic <name> [common]");
    eprintln!("  cargo run -p app -- play  --quiz <file.json> --document <id> [common]");
    eprintln!("  cargo run -p app -- stats [common]");
    eprintln!();
    eprintln!("Documents are registered with `cargo run -p storage --bin seed`.");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>         default: sqlite://quiz.sqlite3");
    eprintln!("  --backend <mode>          local | server | http (default: local)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_BACKEND, QUIZ_API_BASE_URL, QUIZ_API_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Stats,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    backend: BackendMode,
    quiz: Option<PathBuf>,
    topic: Option<String>,
    document: Option<DocumentId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut backend = match std::env::var("QUIZ_BACKEND") {
            Ok(raw) => raw
                .parse::<BackendMode>()
                .map_err(|_| ArgsError::InvalidBackend { raw })?,
            Err(_) => BackendMode::default(),
        };
        let mut quiz = None;
        let mut topic = None;
        let mut document = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--backend" => {
                    let value = require_value(args, "--backend")?;
                    backend = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidBackend { raw: value.clone() })?;
                }
                "--quiz" => quiz = Some(PathBuf::from(require_value(args, "--quiz")?)),
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--document" => {
                    let value = require_value(args, "--document")?;
                    let parsed = value
                        .parse::<DocumentId>()
                        .map_err(|_| ArgsError::InvalidDocumentId { raw: value.clone() })?;
                    document = Some(parsed);
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
            backend,
            quiz,
            topic,
            document,
        })
    }

    /// Remote backends key progress by document, so named topics are local only.
    fn topic_identity(&self) -> Result<TopicIdentity, ArgsError> {
        match (&self.topic, self.document) {
            (Some(_), Some(_)) => Err(ArgsError::ConflictingTopic),
            (Some(_), None) if self.backend != BackendMode::Local => {
                Err(ArgsError::TopicNeedsLocalBackend {
                    backend: self.backend,
                })
            }
            (Some(name), None) => TopicIdentity::topic(name).map_err(|_| ArgsError::InvalidTopic {
                raw: name.clone(),
            }),
            (None, Some(id)) => Ok(TopicIdentity::document(id)),
            (None, None) => Err(ArgsError::MissingTopic),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
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

//
// ─── PLAY ──────────────────────────────────────────────────────────────────────
//

fn read_choice(input: &mut impl BufRead, options: usize) -> io::Result<Option<usize>> {
    loop {
        print!("Your answer [A-{}]: ", OPTION_LETTERS[options.saturating_sub(1).min(3)]);
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let letter = line.trim().chars().next().map(|c| c.to_ascii_uppercase());
        match letter.and_then(|c| OPTION_LETTERS.iter().position(|l| *l == c)) {
            Some(index) if index < options => return Ok(Some(index)),
            _ => println!("Please type one of the option letters."),
        }
    }
}

fn confirm(input: &mut impl BufRead, prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn play(
    services: &AppServices,
    quiz: Quiz,
    topic: TopicIdentity,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = services.controller();
    controller.start(quiz, topic)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let total = controller.active().map_or(0, |a| a.total_questions());
    for index in 0..total {
        let Some(question) = controller
            .active()
            .and_then(|a| a.quiz().question(index))
            .cloned()
        else {
            break;
        };

        println!();
        println!("Question {} of {total}: {}", index + 1, question.prompt);
        for (letter, option) in OPTION_LETTERS.iter().zip(&question.options) {
            println!("  {letter}) {}", option.text);
        }

        let Some(choice) = read_choice(&mut input, question.options.len())? else {
            println!("Input closed; session abandoned without saving.");
            controller.restart();
            return Ok(());
        };
        let reveal = controller.record_answer(index, choice)?;
        if reveal.is_correct() {
            println!("Correct! {}", reveal.explanation);
        } else {
            let right = reveal
                .correct_option
                .and_then(|i| OPTION_LETTERS.get(i))
                .map_or_else(|| "?".to_string(), char::to_string);
            println!("Not quite, the answer was {right}. {}", reveal.explanation);
        }
        if let Some(summary) = &reveal.concept_summary {
            println!("Concept: {summary}");
        }
    }

    loop {
        match complete(&mut controller).await {
            Ok(()) => return Ok(()),
            Err(SessionError::Persistence(err)) => {
                eprintln!("Could not save progress: {err}");
                if !confirm(&mut input, "Retry saving?")? {
                    println!("Result not saved.");
                    return Ok(());
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn complete(controller: &mut SessionController) -> Result<(), SessionError> {
    let done = controller.complete().await?;
    let result = done.result();
    println!();
    println!(
        "Score: {}/{} ({}%) - {}",
        result.questions_correct,
        result.questions_answered,
        result.score_percent,
        done.grade().label()
    );
    for row in done.breakdown() {
        let mark = if row.is_correct { "ok" } else { "x " };
        let letter = |i: Option<usize>| {
            i.and_then(|i| OPTION_LETTERS.get(i))
                .map_or_else(|| "-".to_string(), char::to_string)
        };
        println!(
            "  [{mark}] Q{}: chose {}, correct {}",
            row.index + 1,
            letter(row.chosen),
            letter(row.correct)
        );
    }
    let aggregate = done.aggregate();
    println!(
        "Topic total: {} sessions, {}/{} correct",
        aggregate.session_count, aggregate.total_correct, aggregate.total_answered
    );
    Ok(())
}

//
// ─── STATS ──────────────────────────────────────────────────────────────
//

async fn stats(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let summaries = services.progress_summaries();
    let topics = summaries.topics().await?;
    let overview = summaries.overview().await?;

    println!(
        "Answered {} questions, {} correct (average {}%), {}/{} topics covered",
        overview.total_answered,
        overview.total_correct,
        overview.average_percent(),
        overview.topics_covered,
        overview.topic_count
    );
    for item in topics {
        match &item.aggregate {
            Some(aggregate) => println!(
                "  {:<24} {:>3} sessions  accuracy {:>3}%  last {:>3}%  coverage {:>3}%",
                item.label,
                aggregate.session_count,
                item.accuracy.unwrap_or(0),
                aggregate.last_score_percent.unwrap_or(0),
                item.coverage
            ),
            None => println!("  {:<24} not quizzed yet", item.label),
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next().as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let topic = match cmd {
        Command::Play => Some(parsed.topic_identity().map_err(|e| {
            eprintln!("{e}");
            e
        })?),
        Command::Stats => None,
    };

    // Open + migrate SQLite here so the library crates never touch the filesystem layout.
    prepare_sqlite_file(&parsed.db_url)?;
    let backend = ProgressBackend::from_mode(parsed.backend)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), backend).await?;
    tracing::debug!(db = %parsed.db_url, backend = %services.mode(), "storage ready");

    match cmd {
        Command::Play => {
            let path = parsed.quiz.as_ref().ok_or(ArgsError::MissingQuiz)?;
            let topic = topic.ok_or(ArgsError::MissingTopic)?;
            let raw = std::fs::read_to_string(path)?;
            let quiz = Quiz::from_json(&raw)?;
            play(&services, quiz, topic).await
        }
        Command::Stats => stats(&services).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
