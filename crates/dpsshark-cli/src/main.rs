use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dpsshark_core::{
    AggregationEngine, BackgroundArchive, Config, EngineHandle, IdentityCache, JsonArchive,
    PcapFileSource,
    ReplayReport, replay_source,
};
use glob::glob;
use tracing::Level;

#[cfg(feature = "live")]
mod live;

#[derive(Parser, Debug)]
#[command(name = "dpsshark")]
#[command(version)]
#[command(
    about = "Passive combat statistics from captured game-server traffic.",
    long_about = None,
    after_help = "Examples:\n  dpsshark replay capture.pcapng -o report.json\n  dpsshark replay 'captures/*.pcap' --stdout --pretty\n  dpsshark replay capture.pcap -o report.json --archive-dir logs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a capture file through the reassembler and write a JSON report.
    Replay(ReplayArgs),
    /// Capture from a network interface and print periodic snapshots.
    #[cfg(feature = "live")]
    Live(live::LiveArgs),
    /// List capture interfaces.
    #[cfg(feature = "live")]
    Interfaces,
}

/// Settings shared by every command that runs the engine.
#[derive(clap::Args, Debug, Clone, Default)]
struct EngineArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving one JSON archive per encounter
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// JSON file remembering player names and professions across runs
    #[arg(long)]
    identity_cache: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// Path (or glob pattern) of a .pcap or .pcapng file
    input: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Replay(args) => cmd_replay(args),
        #[cfg(feature = "live")]
        Commands::Live(args) => live::cmd_live(args),
        #[cfg(feature = "live")]
        Commands::Interfaces => live::cmd_interfaces(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    pub(crate) fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

/// Engine wiring resolved from a config file plus command-line overrides.
pub(crate) struct EngineSetup {
    pub(crate) config: Config,
    pub(crate) engine: EngineHandle,
    identity_cache: Option<PathBuf>,
}

impl EngineArgs {
    pub(crate) fn build(&self) -> Result<EngineSetup, CliError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).map_err(|err| {
                CliError::new(
                    format!("invalid config {}: {err}", path.display()),
                    Some("check the TOML syntax and key names".to_string()),
                )
            })?,
            None => Config::default(),
        };
        if let Some(dir) = &self.archive_dir {
            config.archive.dir = Some(dir.clone());
        }
        if let Some(path) = &self.identity_cache {
            config.archive.identity_cache = Some(path.clone());
        }

        let mut engine = AggregationEngine::new(config.engine.clone());
        if let Some(dir) = &config.archive.dir {
            let archive = BackgroundArchive::spawn(JsonArchive::new(dir))
                .context("Failed to start archive writer")?;
            engine = engine.with_archive(Box::new(archive));
        }
        let identity_cache = config.archive.identity_cache.clone();
        if let Some(path) = identity_cache.as_deref().filter(|path| path.exists()) {
            let identities = IdentityCache::load(path)
                .with_context(|| format!("Failed to load identity cache: {}", path.display()))?;
            tracing::info!(players = identities.len(), "identity cache loaded");
            engine = engine.with_identities(identities);
        }

        Ok(EngineSetup {
            config,
            engine: EngineHandle::new(engine),
            identity_cache,
        })
    }
}

impl EngineSetup {
    /// Archive the open encounter and persist identities.
    pub(crate) fn finish(&self, now_ms: u64) -> Result<(), CliError> {
        if self.config.archive.dir.is_some() {
            let mut engine = self.engine.lock();
            engine.clear_all(now_ms);
            engine.flush_archive();
        }
        if let Some(path) = &self.identity_cache {
            self.engine
                .lock()
                .identities()
                .save(path)
                .with_context(|| format!("Failed to write identity cache: {}", path.display()))?;
        }
        Ok(())
    }
}

fn cmd_replay(args: ReplayArgs) -> Result<(), CliError> {
    let ReplayArgs {
        input,
        report,
        stdout,
        pretty,
        compact,
        quiet,
        engine,
    } = args;

    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    let report = if stdout {
        None
    } else {
        Some(report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?)
    };
    if let Some(report_path) = report.as_ref() {
        ensure_distinct_output(report_path, &input_abs)?;
    }

    let setup = engine.build()?;
    let source = PcapFileSource::open(&resolved_input)
        .with_context(|| format!("Failed to open capture: {}", resolved_input.display()))?;
    let rep = replay_source(&resolved_input, source, &setup.engine, &setup.config)
        .context("capture replay failed")?;
    let end_ms = setup.engine.lock().last_activity().unwrap_or(0);
    setup.finish(end_ms)?;

    let json = serialize_report(&rep, pretty, compact)?;
    let Some(report) = report else {
        print!("{}", json);
        return Ok(());
    };

    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;

    if !quiet {
        eprintln!(
            "OK: {} frames, {} players -> {}",
            rep.frames.frames,
            rep.players.len(),
            report.display()
        );
    }
    Ok(())
}

fn ensure_distinct_output(report_path: &Path, input_abs: &Path) -> Result<(), CliError> {
    let parent = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A parent that does not exist yet cannot contain the input.
    let Ok(report_dir) = fs::canonicalize(parent) else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(rep: &ReplayReport, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    let json = if pretty {
        serde_json::to_string_pretty(rep)
    } else {
        serde_json::to_string(rep)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
