//! CLI entry point for daymark.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use daymark_app::{CommandKind, Engine, Response};
use daymark_core::Clock;
use daymark_store::JournalStorage;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Tasks and schedules with durable undo/redo.
#[derive(Parser, Debug)]
#[command(
    name = "daymark",
    version,
    about = "daymark: tasks and schedules backed by an undoable journal"
)]
struct Cli {
    /// Data directory holding `config.toml` and the journal.
    #[arg(long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a single command, e.g. `daymark run add "Buy milk"`.
    Run {
        /// Command word (see `daymark run help`).
        command: String,
        /// Arguments passed to the command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Read commands from standard input, one per line.
    Shell,

    /// Fold history beyond the configured undo depth.
    Compact,
}

fn main() -> Result<ExitCode> {
    let Cli { dir, cmd } = Cli::parse();
    install_tracing();

    let data_dir = resolve_data_dir(dir)?;
    let mut engine =
        Engine::open(&data_dir).with_context(|| format!("failed to open {}", data_dir.display()))?;
    let clear_screen = io::stdout().is_terminal();

    match cmd {
        Command::Run { command, args } => {
            let response = match command.parse::<CommandKind>() {
                Ok(kind) => engine.dispatch(kind, &args)?,
                Err(err) => Response::rejected(&err),
            };
            print_response(&mut io::stdout().lock(), &response, clear_screen)?;
            Ok(if response.rejected {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Shell => {
            run_shell(&mut engine, io::stdin().lock(), &mut io::stdout().lock(), clear_screen)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Compact => {
            let report = engine.compact()?;
            info!(folded = report.folded, purged = report.purged.len(), "Compaction finished");
            println!(
                "Folded {} entries; released {} ids.",
                report.folded,
                report.purged.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_data_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.or_else(|| dirs::data_dir().map(|base| base.join("daymark")))
        .ok_or_else(|| anyhow!("could not determine a data directory; pass --dir"))
}

/// Dispatch every line of `input` until `exit` or end of input.
fn run_shell<S, C>(
    engine: &mut Engine<S, C>,
    input: impl BufRead,
    output: &mut impl Write,
    clear_screen: bool,
) -> Result<()>
where
    S: JournalStorage,
    C: Clock,
{
    for line in input.lines() {
        let line = line.context("failed to read command line")?;
        let tokens = match shell_words::split(&line) {
            Ok(tokens) => tokens,
            Err(err) => {
                writeln!(output, "Rejected: {err}.")?;
                continue;
            }
        };
        let Some((word, args)) = tokens.split_first() else {
            continue;
        };
        let response = match word.parse::<CommandKind>() {
            Ok(kind) => engine.dispatch(kind, args)?,
            Err(err) => Response::rejected(&err),
        };
        print_response(output, &response, clear_screen)?;
        if response.exit {
            debug!("Shell exit requested");
            break;
        }
    }
    Ok(())
}

fn print_response(output: &mut impl Write, response: &Response, clear_screen: bool) -> Result<()> {
    if response.overwrite && clear_screen {
        output.write_all(CLEAR_SCREEN.as_bytes())?;
    }
    for line in response.lines() {
        writeln!(output, "{line}")?;
    }
    output.flush()?;
    Ok(())
}

fn install_tracing() {
    // RUST_LOG overrides the INFO default.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}
