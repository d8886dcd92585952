//! Command‑line interface for droidpy.
//!
//! Runs the Python launcher on a development machine with the same bootstrap
//! the Android build performs, prints the search path it installs, and reads
//! the `python` log tag back from a device through `adb logcat`.

use clap::{Parser, Subcommand};
use colored::*;
use droidpy::config::{DEFAULT_ENTRY_SCRIPT, ENV_ARGUMENT, ENV_PRIVATE};
use droidpy::log_adapter::{LOG_TAG, MemorySink, PlatformLog, Tee};
use droidpy::logcat::{LogEntry, LogFilter, LogLevel, TraceLine, TracebackTracker, threadtime_regex};
use droidpy::{LaunchConfig, LogSink, RunOutcome, SearchPath, launch};
use regex::Regex;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// droidpy CLI top‑level arguments.
#[derive(Parser)]
#[command(name = "droidpy", version, about = "Host tools for the droidpy Android Python launcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands supported by the CLI.
#[derive(Subcommand)]
enum Commands {
    /// Run the launcher on this machine against a local app layout.
    Run {
        /// Private storage root. Defaults to $ANDROID_PRIVATE.
        #[arg(long)]
        private: Option<PathBuf>,
        /// Argument root holding the entry script. Defaults to $ANDROID_ARGUMENT.
        #[arg(long)]
        argument: Option<PathBuf>,
        /// Entry script name inside the argument root.
        #[arg(long, default_value = DEFAULT_ENTRY_SCRIPT)]
        entry: String,
        /// Print a JSON report with the outcome and every logged line.
        #[arg(long)]
        json: bool,
        /// Arguments passed to the script as sys.argv[1:].
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the module search path the launcher installs.
    Paths {
        /// Private storage root.
        #[arg(long)]
        private: PathBuf,
        /// Argument root.
        #[arg(long)]
        argument: PathBuf,
        /// Python version as MAJOR.MINOR. Defaults to the linked interpreter.
        #[arg(long, value_parser = parse_version)]
        python: Option<(u8, u8)>,
        /// Print JSON instead of one entry per line.
        #[arg(long)]
        json: bool,
    },
    /// Show the launcher's log output from a connected device.
    Logs {
        /// Serial of the device to read from (adb -s).
        #[arg(long)]
        device: Option<String>,
        /// Number of lines to show.
        #[arg(long, default_value_t = 100)]
        lines: usize,
        /// Minimum log level to display (verbose, debug, info, warn, error).
        #[arg(long, default_value = "info")]
        level: LogLevel,
        /// Follow log output in real-time (like tail -f).
        #[arg(long, short = 'f')]
        follow: bool,
        /// Show only tracebacks and crashes.
        #[arg(long)]
        crashes: bool,
        /// Show these tags instead of the python tag (can be used multiple times).
        #[arg(long, short = 't')]
        tag: Vec<String>,
        /// Search for specific text in log messages.
        #[arg(long, short = 's')]
        search: Option<String>,
    },
}

// `launch` sets process environment variables, so no worker threads.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { private, argument, entry, json, args } => {
            let status = handle_run(private, argument, entry, json, args)?;
            std::process::exit(status);
        }
        Commands::Paths { private, argument, python, json } => {
            handle_paths(&private, &argument, python, json)
        }
        Commands::Logs { device, lines, level, follow, crashes, tag, search } => {
            let filter = LogFilter { level, tags: tag, search, crashes_only: crashes };
            handle_logs(device, lines, follow, filter).await
        }
    }
}

/// Terminal output for the run, paths and logs commands.
mod ui {
    use colored::*;
    use droidpy::RunOutcome;
    use std::fmt::Display;

    /// Title line, optionally boxed between two rules.
    pub fn title(text: &str, boxed: bool) {
        let rule = "━".repeat(80).bright_cyan();
        if boxed {
            println!("{}", rule);
        }
        println!("{}", text.bright_cyan().bold());
        if boxed {
            println!("{}", rule);
        }
    }

    /// `label: value` with the label dimmed.
    pub fn field(label: &str, value: impl Display) {
        println!("  {} {}", format!("{}:", label).bright_black(), value.to_string().bright_white());
    }

    /// One line summarising how the script ended.
    pub fn outcome(outcome: &RunOutcome) {
        let status = outcome.status();
        let text = match outcome {
            RunOutcome::Completed => "Script completed".to_string(),
            RunOutcome::Exited { code } => format!("Script exited with status {}", code),
            RunOutcome::Failed => "Script raised an uncaught exception".to_string(),
            RunOutcome::EntryMissing => "Entry script could not be opened".to_string(),
            RunOutcome::Aborted => "Interpreter bootstrap failed".to_string(),
        };
        match (outcome, status) {
            (_, 0) => println!("{} {}", "✓".bright_green(), text.bright_green()),
            (RunOutcome::Exited { .. }, _) => println!("{} {}", "!".bright_yellow(), text.bright_yellow()),
            _ => eprintln!("{} {}", "✗".bright_red(), text.bright_red()),
        }
    }

    pub fn problem(text: &str) {
        eprintln!("{}", text.bright_red());
    }

    /// Suggests a command to try next.
    pub fn hint(command: &str, what: &str) {
        println!("  • {}: {}", what.bright_blue(), command.bright_white());
    }
}

/// Outcome of `droidpy run --json`.
#[derive(Serialize)]
struct RunReport {
    #[serde(flatten)]
    outcome: RunOutcome,
    status: i32,
    lines: Vec<String>,
}

/// Runs the launcher in this process and returns the script's exit status.
fn handle_run(
    private: Option<PathBuf>,
    argument: Option<PathBuf>,
    entry: String,
    json: bool,
    args: Vec<String>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = LaunchConfig::from_lookup(|key| {
        let flag = match key {
            ENV_PRIVATE => private.as_ref(),
            ENV_ARGUMENT => argument.as_ref(),
            _ => None,
        };
        flag.map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env::var(key).ok())
    })?;
    let program = env::args().next().unwrap_or_else(|| "droidpy".to_string());
    let config = config
        .with_entry_script(entry)
        .with_argv(std::iter::once(program).chain(args));

    if json {
        let capture = Arc::new(MemorySink::new());
        let sink: Arc<dyn LogSink> = Arc::new(Tee(PlatformLog, capture.clone()));
        let outcome = launch(config, sink);
        let report = RunReport {
            outcome,
            status: outcome.status(),
            lines: capture.lines(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.status);
    }

    ui::title("droidpy run", false);
    ui::field("Private root", config.private_root.display());
    ui::field("Argument root", config.argument_root.display());
    ui::field("Entry script", config.entry_path().display());

    let outcome = launch(config, Arc::new(PlatformLog));
    ui::outcome(&outcome);
    Ok(outcome.status())
}

fn parse_version(s: &str) -> Result<(u8, u8), String> {
    let invalid = || format!("Invalid Python version: {}. Use MAJOR.MINOR, e.g. 3.11", s);
    let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
    Ok((
        major.parse().map_err(|_| invalid())?,
        minor.parse().map_err(|_| invalid())?,
    ))
}

/// Version of the Python library this binary links against.
fn interpreter_version() -> (u8, u8) {
    pyo3::Python::initialize();
    pyo3::Python::attach(|py| {
        let version = py.version_info();
        (version.major, version.minor)
    })
}

fn handle_paths(
    private: &Path,
    argument: &Path,
    python: Option<(u8, u8)>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = python.unwrap_or_else(interpreter_version);
    let search_path = SearchPath::new(private, argument, version);

    if json {
        println!("{}", serde_json::to_string_pretty(&search_path)?);
        return Ok(());
    }

    ui::title(&format!("sys.path for Python {}.{}", version.0, version.1), false);
    for (i, entry) in search_path.entries().iter().enumerate() {
        println!("{} {}", format!("{}.", i + 1).bright_black(), entry.bright_white());
    }
    Ok(())
}

/// Detects Android SDK location from environment variables or common paths.
fn detect_android_sdk() -> Option<String> {
    let mut sdk_paths = Vec::new();

    if let Ok(path) = env::var("ANDROID_SDK_ROOT") {
        sdk_paths.push(path);
    }
    if let Ok(path) = env::var("ANDROID_HOME") {
        if !sdk_paths.contains(&path) {
            sdk_paths.push(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let default = match env::consts::OS {
            "windows" => home.join("AppData").join("Local").join("Android").join("Sdk"),
            "macos" => home.join("Library").join("Android").join("sdk"),
            _ => home.join("Android").join("Sdk"),
        };
        sdk_paths.push(default.to_string_lossy().to_string());
    }

    sdk_paths
        .into_iter()
        .filter(|p| !p.is_empty())
        .find(|p| Path::new(p).exists())
}

/// Finds adb executable from PATH or the SDK's platform-tools.
fn find_adb() -> Option<String> {
    match Command::new("adb").arg("version").output() {
        Ok(output) if output.status.success() => return Some("adb".to_string()),
        _ => {}
    }

    let sdk = detect_android_sdk()?;
    let adb_path = if cfg!(windows) {
        Path::new(&sdk).join("platform-tools").join("adb.exe")
    } else {
        Path::new(&sdk).join("platform-tools").join("adb")
    };
    adb_path
        .exists()
        .then(|| adb_path.to_string_lossy().to_string())
}

/// Prints one entry, framing Python tracebacks and native crashes.
fn print_entry(entry: &LogEntry, trace: TraceLine) {
    let bar = "─".repeat(77);
    match trace {
        TraceLine::Start => {
            println!("{}", format!("┌{}", bar).bright_red());
            println!("{} {} {}",
                "│".bright_red(),
                "🐍 PYTHON TRACEBACK".bright_red().bold(),
                entry.timestamp.bright_black()
            );
            return;
        }
        TraceLine::Inside => {
            println!("{} {}", "│".bright_red(), entry.message.white());
            return;
        }
        TraceLine::End => {
            println!("{} {}", "│".bright_red(), entry.message.bright_red().bold());
            println!("{}", format!("└{}", bar).bright_red());
            return;
        }
        TraceLine::Outside => {}
    }

    if entry.is_native_crash() || entry.is_java_crash() {
        let title = if entry.is_native_crash() { "💥 NATIVE CRASH" } else { "☕ JAVA CRASH" };
        println!("{} {} {} {}: {}",
            "│".bright_red(),
            title.bright_red().bold(),
            entry.timestamp.bright_black(),
            entry.tag.bright_red().bold(),
            entry.message.bright_white()
        );
        return;
    }

    let level_badge = match entry.level.as_str() {
        "V" => " V ".on_bright_black().black(),
        "D" => " D ".on_blue().white(),
        "I" => " I ".on_green().white(),
        "W" => " W ".on_yellow().black(),
        "E" => " E ".on_red().white(),
        "F" => " F ".on_red().white().bold(),
        other => format!(" {} ", other).on_white().black(),
    };

    let tag_formatted = if entry.is_python() {
        format!("{}", entry.tag.bright_cyan().bold())
    } else {
        format!("{}", entry.tag.bright_black())
    };

    println!("{} {} {} {}",
        entry.timestamp.bright_black(),
        level_badge,
        tag_formatted,
        entry.message.bright_white()
    );
}

/// Applies the traceback tracker and the filter to one raw logcat line.
fn classify(
    line: &str,
    log_regex: &Regex,
    tracker: &mut TracebackTracker,
    filter: &LogFilter,
) -> Option<(LogEntry, TraceLine)> {
    let entry = LogEntry::parse(line, log_regex)?;
    let trace = if entry.is_python() {
        tracker.observe(&entry.message)
    } else {
        TraceLine::Outside
    };
    let in_traceback = trace != TraceLine::Outside;
    filter.matches(&entry, in_traceback).then_some((entry, trace))
}

fn adb_logcat_args(device: Option<&str>, dump: bool) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(id) = device {
        args.extend(["-s".to_string(), id.to_string()]);
    }
    args.extend(["logcat", "-v", "threadtime"].map(String::from));
    if dump {
        args.push("-d".to_string());
    }
    args
}

/// Streams logcat until adb exits or the user interrupts.
async fn stream_logcat_output(
    adb: &str,
    device: Option<&str>,
    filter: &LogFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::process::Command as TokioCommand;

    let mut child = TokioCommand::new(adb)
        .args(adb_logcat_args(device, false))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdout = child.stdout.take().ok_or("Failed to capture stdout")?;

    let log_regex = threadtime_regex()?;
    let mut tracker = TracebackTracker::new();
    let mut lines = BufReader::new(stdout).lines();

    println!();
    ui::title(&format!("  📱 LOGCAT · tag {} · Press Ctrl+C to stop", LOG_TAG), false);
    println!();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some((entry, trace)) = classify(line.trim_end(), &log_regex, &mut tracker, filter) {
                    print_entry(&entry, trace);
                }
            }
            Ok(None) => break,
            Err(e) => {
                ui::problem(&format!("Error reading logcat: {}", e));
                break;
            }
        }
    }
    Ok(())
}

/// Shows the launcher's recent log output.
async fn handle_logs(
    device: Option<String>,
    lines: usize,
    follow: bool,
    filter: LogFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let adb = find_adb()
        .ok_or("adb not found. Make sure Android SDK platform-tools is installed and accessible.")?;

    if follow {
        return stream_logcat_output(&adb, device.as_deref(), &filter).await;
    }

    let output = Command::new(&adb)
        .args(adb_logcat_args(device.as_deref(), true))
        .output()?;
    if !output.status.success() {
        return Err(format!("adb logcat failed: {}", String::from_utf8_lossy(&output.stderr).trim()).into());
    }

    let log_regex = threadtime_regex()?;
    let mut tracker = TracebackTracker::new();
    let logs = String::from_utf8_lossy(&output.stdout);
    let entries: Vec<(LogEntry, TraceLine)> = logs
        .lines()
        .filter_map(|line| classify(line, &log_regex, &mut tracker, &filter))
        .collect();

    let tracebacks = entries.iter().filter(|(_, t)| *t == TraceLine::Start).count();
    let crashes = entries
        .iter()
        .filter(|(e, _)| e.is_native_crash() || e.is_java_crash())
        .count();

    println!();
    ui::title(&format!("  📋 DROIDPY LOG VIEWER · tag {}", LOG_TAG), true);
    ui::field("Level", format!("{:?}", filter.level));
    ui::field("Lines", lines);
    ui::field("Crashes only", filter.crashes_only);
    if let Some(ref s) = filter.search {
        ui::field("Search", format!("\"{}\"", s));
    }
    println!();

    if tracebacks > 0 || crashes > 0 {
        ui::problem(&format!("⚠️  Issues detected (Tracebacks: {}, Crashes: {})", tracebacks, crashes));
        println!();
    }

    let skip = entries.len().saturating_sub(lines);
    if entries.is_empty() {
        println!("{}", "No matching log entries found.".bright_yellow());
        ui::hint("droidpy logs -f", "Follow logs in real-time");
        ui::hint("droidpy logs --level debug", "Lower the level");
    } else {
        println!("{}", format!("Showing {} of {} matching entries:",
            entries.len() - skip, entries.len()).bright_black());
        println!();
        for (entry, trace) in &entries[skip..] {
            print_entry(entry, *trace);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_python_versions() {
        assert_eq!(parse_version("3.11"), Ok((3, 11)));
        assert!(parse_version("3").is_err());
        assert!(parse_version("three.eleven").is_err());
    }

    #[test]
    fn logcat_args_select_device() {
        assert_eq!(
            adb_logcat_args(Some("emulator-5554"), true),
            ["-s", "emulator-5554", "logcat", "-v", "threadtime", "-d"]
        );
        assert_eq!(adb_logcat_args(None, false), ["logcat", "-v", "threadtime"]);
    }

    #[test]
    fn classify_keeps_whole_traceback_under_search() {
        let log_regex = threadtime_regex().unwrap();
        let mut tracker = TracebackTracker::new();
        let filter = LogFilter { search: Some("boom".into()), ..LogFilter::default() };
        let lines = [
            "10-19 12:00:00.000  42  42 I python  : starting",
            "10-19 12:00:00.001  42  42 I python  : Traceback (most recent call last):",
            "10-19 12:00:00.002  42  42 I python  :   File \"main.py\", line 1, in <module>",
            "10-19 12:00:00.003  42  42 I python  : RuntimeError: boom",
        ];
        let kept: Vec<TraceLine> = lines
            .iter()
            .filter_map(|l| classify(l, &log_regex, &mut tracker, &filter))
            .map(|(_, t)| t)
            .collect();
        assert_eq!(kept, [TraceLine::Start, TraceLine::Inside, TraceLine::End]);
    }
}
