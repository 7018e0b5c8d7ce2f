use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lesson_core::model::{ItemName, LessonId, UserProfile};
use services::{AppServices, Clock, EngineConfig, LessonRun, OraclePolicy, ScriptedOracle};
use tracing_subscriber::EnvFilter;

const HISTORY_DAYS: i64 = 30;
const HISTORY_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidSeed { raw: String },
    InvalidItem { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson-id value: {raw}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidItem { raw } => write!(f, "invalid --fail-first value: {raw:?}"),
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
    eprintln!(
        "  handly practice [--db <sqlite_url>] [--lesson-id <id>] [--seed <n>] [--fail-first <item>]..."
    );
    eprintln!("  handly profile  [--db <sqlite_url>]");
    eprintln!("  handly reset    [--db <sqlite_url>]");
    eprintln!("  handly history  [--db <sqlite_url>] [--lesson-id <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:handly.sqlite3");
    eprintln!("  --lesson-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  HANDLY_DB_URL, HANDLY_LESSON_ID, RUST_LOG");
    eprintln!("  HANDLY_STARTING_HEARTS, HANDLY_XP_PER_LESSON, HANDLY_PROGRESS_PER_LESSON");
    eprintln!("  HANDLY_JUDGE_TIMEOUT_MS, HANDLY_ORACLE_LATENCY_MS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Profile,
    Reset,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "profile" => Some(Self::Profile),
            "reset" => Some(Self::Reset),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    lesson_id: LessonId,
    lesson_filter: Option<LessonId>,
    seed: Option<u64>,
    fail_first: Vec<ItemName>,
}

impl Args {
    fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("HANDLY_DB_URL")
            .map_or_else(|| "sqlite://handly.sqlite3".into(), normalize_sqlite_url);
        let mut lesson_id = env("HANDLY_LESSON_ID")
            .and_then(|value| value.parse::<LessonId>().ok())
            .unwrap_or_else(|| LessonId::new(1));
        let mut lesson_filter = None;
        let mut seed = None;
        let mut fail_first = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--lesson-id" => {
                    let value = require_value(&mut args, "--lesson-id")?;
                    let parsed: LessonId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                    lesson_id = parsed;
                    lesson_filter = Some(parsed);
                }
                "--seed" => {
                    let value = require_value(&mut args, "--seed")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?;
                    seed = Some(parsed);
                }
                "--fail-first" => {
                    let value = require_value(&mut args, "--fail-first")?;
                    let item = ItemName::new(value.clone())
                        .map_err(|_| ArgsError::InvalidItem { raw: value })?;
                    fail_first.push(item);
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
            lesson_id,
            lesson_filter,
            seed,
            fail_first,
        })
    }

    /// Each `--fail-first` occurrence fails one more attempt of that item.
    fn oracle_policy(&self) -> OraclePolicy {
        if self.fail_first.is_empty() {
            return OraclePolicy::AlwaysPass;
        }
        let mut failures: HashMap<ItemName, u32> = HashMap::new();
        for item in &self.fail_first {
            *failures.entry(item.clone()).or_default() += 1;
        }
        OraclePolicy::FailFirst(failures)
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means a practice run.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Practice,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Practice,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }

    let parsed = Args::parse(argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let config = EngineConfig::from_env()?;

    let mut oracle = ScriptedOracle::new(parsed.oracle_policy()).with_latency(config.oracle_latency());
    if let Some(seed) = parsed.seed {
        oracle = oracle.with_seed(seed);
    }

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::system(), config, Arc::new(oracle)).await?;

    match cmd {
        Command::Practice => {
            let lesson_loop = services.lesson_loop();
            let mut lesson = lesson_loop.start_lesson(parsed.lesson_id)?;
            let run = lesson_loop.run_to_end(&mut lesson).await?;
            print_run(lesson.session().lesson_id(), &run);
        }
        Command::Profile => print_profile(&services.progression().read().await),
        Command::Reset => {
            let profile = services.progression().reset().await?;
            println!("profile reset");
            print_profile(&profile);
        }
        Command::History => {
            let items = services
                .history()
                .list_recent(parsed.lesson_filter, HISTORY_DAYS, HISTORY_LIMIT)
                .await?;
            if items.is_empty() {
                println!("no completed lessons in the last {HISTORY_DAYS} days");
            }
            for item in items {
                println!(
                    "#{} lesson {} at {}: {} rounds, {} mistakes, {} hearts left, +{} xp",
                    item.id,
                    item.lesson_id,
                    item.completed_at.format("%Y-%m-%d %H:%M"),
                    item.rounds,
                    item.mistakes,
                    item.hearts_left,
                    item.xp_gained,
                );
            }
        }
    }
    Ok(())
}

fn print_run(lesson_id: LessonId, run: &LessonRun) {
    for (n, round) in run.rounds.iter().enumerate() {
        let result = if round.verdict.passed { "pass" } else { "fail" };
        println!(
            "round {}: {} {result} ({}% confidence), hearts {}, correct {}",
            n + 1,
            round.item,
            round.verdict.confidence,
            round.hearts,
            round.correct_count,
        );
    }
    if run.completed {
        println!("lesson {lesson_id} complete");
    } else {
        println!("lesson {lesson_id} failed: out of hearts");
    }
    if let Some(profile) = &run.profile {
        print_profile(profile);
    }
}

fn print_profile(profile: &UserProfile) {
    let completed: Vec<String> = profile
        .completed_lesson_ids()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "{}: level {} ({}%), {} xp, streak {}, completed [{}]",
        profile.name(),
        profile.level(),
        profile.level_progress(),
        profile.experience_points(),
        profile.streak(),
        completed.join(", "),
    );
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn env_supplies_defaults_and_flags_override() {
        let env = |key: &str| match key {
            "HANDLY_DB_URL" => Some("sqlite::memory:".to_string()),
            "HANDLY_LESSON_ID" => Some("2".to_string()),
            _ => None,
        };
        let from_env = Args::parse(Vec::new(), env).unwrap();
        assert_eq!(from_env.db_url, "sqlite::memory:");
        assert_eq!(from_env.lesson_id, LessonId::new(2));
        assert_eq!(from_env.lesson_filter, None);

        let flagged = Args::parse(args(&["--lesson-id", "7", "--seed", "42"]), env).unwrap();
        assert_eq!(flagged.lesson_id, LessonId::new(7));
        assert_eq!(flagged.lesson_filter, Some(LessonId::new(7)));
        assert_eq!(flagged.seed, Some(42));
    }

    #[test]
    fn repeated_fail_first_counts_attempts() {
        let parsed = Args::parse(
            args(&["--fail-first", "Help", "--fail-first", "Help", "--fail-first", "No"]),
            |_| None,
        )
        .unwrap();
        let OraclePolicy::FailFirst(failures) = parsed.oracle_policy() else {
            panic!("expected fail-first policy");
        };
        assert_eq!(failures[&ItemName::new("Help").unwrap()], 2);
        assert_eq!(failures[&ItemName::new("No").unwrap()], 1);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Args::parse(args(&["--lesson-id", "abc"]), |_| None),
            Err(ArgsError::InvalidLessonId { .. })
        ));
        assert!(matches!(
            Args::parse(args(&["--fail-first", "  "]), |_| None),
            Err(ArgsError::InvalidItem { .. })
        ));
        assert!(matches!(
            Args::parse(args(&["--db"]), |_| None),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            Args::parse(args(&["--verbose"]), |_| None),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/handly.sqlite3".to_string());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/handly.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
