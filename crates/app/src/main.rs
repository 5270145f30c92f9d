mod demo;

use std::fmt;
use std::path::PathBuf;

use funnel_core::flow::{FlowConfig, QuizFlow};
use server::AppState;
use services::{AppServices, Clock, export_submissions, render_report};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://funnel.sqlite3";
const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_LEGAL_DIR: &str = "legal";
const DEFAULT_EXPORT_PATH: &str = "submissions.csv";
const DEFAULT_LOG_FILTER: &str = "info,server=debug,services=debug";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidFlowConfig { path: PathBuf, reason: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFlowConfig { path, reason } => {
                write!(f, "invalid flow config {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- serve  [--db <sqlite_url>] [--bind <addr>] [--legal-dir <dir>]");
    eprintln!("  cargo run -p app -- export [--db <sqlite_url>] [--out <file.csv>]");
    eprintln!("  cargo run -p app -- report [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- demo   [--db <sqlite_url>] [--flow-config <file.json>]");
    eprintln!();
    eprintln!("demo keeps its session in memory unless --db is passed on the command line.");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --bind {DEFAULT_BIND}");
    eprintln!("  --legal-dir {DEFAULT_LEGAL_DIR}");
    eprintln!("  --out {DEFAULT_EXPORT_PATH}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FUNNEL_DB_URL, FUNNEL_BIND, FUNNEL_LEGAL_DIR, FUNNEL_FLOW_CONFIG, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Export,
    Report,
    Demo,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" => Some(Self::Serve),
            "export" => Some(Self::Export),
            "report" => Some(Self::Report),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    bind: String,
    legal_dir: PathBuf,
    out: PathBuf,
    flow_config: Option<PathBuf>,
    /// Set only by `--db`; the environment default does not count.
    db_explicit: bool,
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Args {
    fn from_env() -> Self {
        Self {
            db_url: normalize_sqlite_url(
                env_value("FUNNEL_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into()),
            ),
            bind: env_value("FUNNEL_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            legal_dir: env_value("FUNNEL_LEGAL_DIR")
                .unwrap_or_else(|| DEFAULT_LEGAL_DIR.into())
                .into(),
            out: DEFAULT_EXPORT_PATH.into(),
            flow_config: env_value("FUNNEL_FLOW_CONFIG").map(PathBuf::from),
            db_explicit: false,
        }
    }

    /// Flags override the environment.
    fn parse(mut self, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    self.db_url = normalize_sqlite_url(require_value(args, "--db")?);
                    self.db_explicit = true;
                }
                "--bind" => self.bind = require_value(args, "--bind")?,
                "--legal-dir" => self.legal_dir = require_value(args, "--legal-dir")?.into(),
                "--out" => self.out = require_value(args, "--out")?.into(),
                "--flow-config" => {
                    self.flow_config = Some(require_value(args, "--flow-config")?.into());
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(self)
    }

    fn uses_sqlite(&self, cmd: Command) -> bool {
        cmd != Command::Demo || self.db_explicit
    }

    fn flow(&self) -> Result<QuizFlow, ArgsError> {
        let Some(path) = &self.flow_config else {
            return Ok(QuizFlow::default());
        };
        let invalid = |reason: String| ArgsError::InvalidFlowConfig {
            path: path.clone(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let config = FlowConfig::from_json(&raw).map_err(|e| invalid(e.to_string()))?;
        QuizFlow::new(config).map_err(|e| invalid(e.to_string()))
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

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand (or flags only) means serve.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Serve,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Serve,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let args = Args::from_env()
        .parse(&mut argv.into_iter())
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    init_tracing();

    let clock = Clock::default_clock();
    let services = if args.uses_sqlite(cmd) {
        prepare_sqlite_file(&args.db_url)?;
        AppServices::new_sqlite(&args.db_url, clock).await?
    } else {
        tracing::info!("demo runs against an in-memory store");
        AppServices::in_memory(clock)
    };
    let tracking = services.tracking();

    match cmd {
        Command::Serve => {
            let listener = TcpListener::bind(&args.bind).await?;
            let state = AppState::new(tracking, args.legal_dir);
            server::serve(listener, state, shutdown_signal()).await?;
        }
        Command::Export => {
            let summary = export_submissions(&tracking, &args.out).await?;
            println!(
                "exported {} rows ({} columns) to {}",
                summary.rows,
                summary.columns.len(),
                args.out.display()
            );
        }
        Command::Report => {
            let stats = tracking.stats().await?;
            let records = tracking.list_submissions().await?;
            print!("{}", render_report(&stats, &records));
        }
        Command::Demo => {
            let flow = args.flow()?;
            let failed = demo::walk(flow, clock, tracking.clone()).await?;
            if failed > 0 {
                eprintln!("{failed} tracking calls failed");
            }
            let stats = tracking.stats().await?;
            let records = tracking.list_submissions().await?;
            print!("{}", render_report(&stats, &records));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // Binary glue: print once and exit.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
