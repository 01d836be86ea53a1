//! `towcar-cli` – TowCar command line interface.
//!
//! ```text
//! towcar run [PATH|-]   process a replay log (default: stdin)
//! towcar config         print the effective configuration
//! towcar config --write save the effective configuration to the config file
//! towcar help           show usage
//! ```
//!
//! `run` writes one JSON [`FrameReport`][towcar_types::FrameReport] per frame
//! to stdout.  Banner, status and logs go to stderr.  Ctrl-C stops the run
//! after the frame in flight.

mod config;
mod runner;

use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use towcar_hal::{JsonLinesSink, ReplayReader};
use towcar_runtime::{Session, init_tracing};

use crate::runner::StopReason;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// `None` reads stdin.
    Run { input: Option<String> },
    /// `write` persists the effective configuration.
    Config { write: bool },
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        match args.first().map(String::as_str) {
            None | Some("help") | Some("-h") | Some("--help") => Ok(Command::Help),
            Some("config") => match &args[1..] {
                [] => Ok(Command::Config { write: false }),
                [flag] if flag == "--write" => Ok(Command::Config { write: true }),
                _ => Err("`config` only accepts --write".to_string()),
            },
            Some("run") => match &args[1..] {
                [] => Ok(Command::Run { input: None }),
                [path] if path == "-" => Ok(Command::Run { input: None }),
                [path] => Ok(Command::Run {
                    input: Some(path.clone()),
                }),
                _ => Err("`run` takes at most one input path".to_string()),
            },
            Some(other) => Err(format!("unknown command '{other}'")),
        }
    }
}

fn main() -> ExitCode {
    let _guard = init_tracing("towcar");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match Command::parse(&args) {
        Ok(Command::Run { input }) => cmd_run(input.as_deref()),
        Ok(Command::Config { write }) => cmd_config(write),
        Ok(Command::Help) => {
            print_help();
            ExitCode::SUCCESS
        }
        Err(msg) => {
            eprintln!("{}: {}", "Error".red().bold(), msg);
            print_help();
            ExitCode::from(2)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_run(input: Option<&str>) -> ExitCode {
    print_banner();

    let cfg = load_config_or_default();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current frame …".yellow().bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the run can only end at end of input");
    }

    // ── Input ─────────────────────────────────────────────────────────────
    let reader: Box<dyn BufRead> = match input {
        None => {
            eprintln!("  Reading replay from {}", "stdin".bold());
            Box::new(io::stdin().lock())
        }
        Some(path) => match File::open(path) {
            Ok(f) => {
                eprintln!("  Reading replay from {}", path.bold());
                Box::new(BufReader::new(f))
            }
            Err(e) => {
                eprintln!("{}: cannot open {}: {}", "Error".red().bold(), path, e);
                return ExitCode::FAILURE;
            }
        },
    };

    let mut session = Session::with_intrinsics(cfg.pipeline, cfg.camera);
    let mut sink = JsonLinesSink::new("stdout", io::stdout().lock());
    eprintln!("  Session {}\n", session.id().to_string().dimmed());

    match runner::run(&mut session, ReplayReader::new(reader), &mut sink, &shutdown) {
        Ok(summary) => {
            let how = match summary.stopped {
                StopReason::EndOfLog => "end of input".green(),
                StopReason::Quit => "quit".green(),
                StopReason::Interrupted => "interrupted".yellow(),
            };
            eprintln!(
                "\n  {} {} frame(s), {} command(s), {} skipped line(s) – {}",
                "✓".green().bold(),
                summary.frames,
                summary.commands,
                summary.skipped,
                how
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Run aborted".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_config(write: bool) -> ExitCode {
    let cfg = load_config_or_default();
    if write {
        return match config::save(&cfg) {
            Ok(path) => {
                eprintln!(
                    "  {} Config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                ExitCode::FAILURE
            }
        };
    }
    match toml::to_string_pretty(&cfg) {
        Ok(raw) => {
            print!("{raw}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_config_or_default() -> config::Config {
    let path = config::config_path();
    match config::load() {
        Ok(cfg) => {
            if path.exists() {
                eprintln!("  Config loaded from {}", path.display().to_string().bold());
            } else {
                eprintln!("  {}", "No config file found; using defaults.".dimmed());
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn print_banner() {
    eprintln!();
    eprintln!("{}", r#"  _____               ___         "#.bold().cyan());
    eprintln!("{}", r#" |_   _|____ __ __  / __|__ _ _ _ "#.bold().cyan());
    eprintln!("{}", r#"   | |/ _ \ V  V / | (__/ _` | '_|"#.bold().cyan());
    eprintln!("{}", r#"   |_|\___/\_/\_/   \___\__,_|_|  "#.bold().cyan());
    eprintln!();
    eprintln!(
        "  {} {}",
        "TowCar".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Marshalling gestures and fiducial docking");
    eprintln!();
}

fn print_help() {
    eprintln!("{}", "Usage:".bold());
    eprintln!("  towcar run [PATH|-]   process a replay log (default: stdin)");
    eprintln!("  towcar config         print the effective configuration");
    eprintln!("  towcar config --write save the effective configuration");
    eprintln!("  towcar help           show this message");
    eprintln!();
    eprintln!("{}", "Environment:".bold());
    eprintln!("  TOWCAR_CONFIG           config file path (default ~/.towcar/config.toml)");
    eprintln!("  TOWCAR_MARKER_IDS       accepted marker ids, comma-separated");
    eprintln!("  TOWCAR_MARKER_SIZE      marker edge length");
    eprintln!("  TOWCAR_SMOOTHING_ALPHA  pose smoothing factor (0–1)");
    eprintln!("  TOWCAR_LOG_FORMAT       json | pretty | compact");
    eprintln!("  RUST_LOG                log filter (default info)");
}
