//! vtinterp - replay terminal output through the VT interpreter
//!
//! Reads a captured pty transcript (or stdin), feeds it through a session
//! and prints the final terminal state.
//!
//! ```text
//! vtinterp session.log              # replay a transcript
//! script -q /dev/null ls | vtinterp # replay stdin
//! vtinterp -e cp1251 -s 132x50 dump.bin
//! ```

use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vtinterp::{Config, EncodingMode, Session, SessionEvent, TermEvent, TerminalState};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Diagnostics listed in the summary
const MAX_LISTED_DIAGNOSTICS: usize = 10;

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    encoding: Option<EncodingMode>,
    size: Option<(u16, u16)>,
    clipboard: bool,
    log_level: Option<String>,
    input: Option<PathBuf>,
}

fn print_version() {
    eprintln!("vtinterp {}", VERSION);
}

fn print_help() {
    eprintln!("vtinterp {} - VT/ANSI escape sequence interpreter", VERSION);
    eprintln!();
    eprintln!("Usage: vtinterp [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Reads FILE (or stdin) as raw terminal output and prints the final state.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e, --encoding <NAME>  ascii, utf-8, iso-8859-1, windows-1251");
    eprintln!("      --codepage <N>     Encoding by codepage (20127, 65001, 28591, 1251)");
    eprintln!("  -s, --size <COLSxROWS> Terminal size (default: config, then host terminal)");
    eprintln!("      --clipboard        Copy OSC 52 selections to the system clipboard");
    eprintln!("      --log-level <LVL>  error, warn, info, debug, trace");
    eprintln!("  -v, --version          Show version");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.vtinterp/config.toml");
    eprintln!("Log file:      ~/.vtinterp/vtinterp.log (RUST_LOG overrides the level)");
}

enum Command {
    Run(Args),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut parsed = Args::default();
    let mut i = 0;

    let value = |i: &mut usize, name: &str| -> Result<String, String> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| format!("Missing argument for {}", name))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-e" | "--encoding" => {
                let name = value(&mut i, "--encoding")?;
                parsed.encoding = Some(name.parse().map_err(|e| format!("{}", e))?);
            }
            "--codepage" => {
                let raw = value(&mut i, "--codepage")?;
                let codepage: u32 = raw
                    .parse()
                    .map_err(|_| format!("Invalid codepage: {}", raw))?;
                parsed.encoding =
                    Some(EncodingMode::from_codepage(codepage).map_err(|e| format!("{}", e))?);
            }
            "-s" | "--size" => {
                let raw = value(&mut i, "--size")?;
                parsed.size = Some(parse_size(&raw).ok_or_else(|| format!("Invalid size: {}", raw))?);
            }
            "--clipboard" => parsed.clipboard = true,
            "--log-level" => parsed.log_level = Some(value(&mut i, "--log-level")?),
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            path => {
                if parsed.input.is_some() {
                    return Err(format!("Unexpected argument: {}", path));
                }
                // "-" is stdin
                if path != "-" {
                    parsed.input = Some(PathBuf::from(path));
                }
            }
        }
        i += 1;
    }

    Ok(Command::Run(parsed))
}

/// Parse `COLSxROWS`
fn parse_size(raw: &str) -> Option<(u16, u16)> {
    let (cols, rows) = raw.split_once(|c| c == 'x' || c == 'X')?;
    let cols: u16 = cols.trim().parse().ok()?;
    let rows: u16 = rows.trim().parse().ok()?;
    (cols > 0 && rows > 0).then_some((cols, rows))
}

/// Log to ~/.vtinterp/vtinterp.log
fn init_logging(level: &str) {
    let log_path = Config::log_path().unwrap_or_else(|| PathBuf::from("vtinterp.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Running tallies of the events seen during a replay
#[derive(Debug, Default)]
struct Summary {
    printed: usize,
    bells: usize,
    clears: usize,
    erases: usize,
    scrolls: usize,
    replies: Vec<Vec<u8>>,
    selections: usize,
    diagnostics: Vec<String>,
    diagnostic_count: usize,
}

impl Summary {
    fn record(&mut self, event: &TermEvent) {
        match event {
            TermEvent::Print(_) => self.printed += 1,
            TermEvent::Bell => self.bells += 1,
            TermEvent::ClearScreen => self.clears += 1,
            TermEvent::EraseLine(_) | TermEvent::EraseDisplay(_) => self.erases += 1,
            TermEvent::ScrollUp { .. } | TermEvent::ScrollDown { .. } => self.scrolls += 1,
            TermEvent::Reply(response) => self.replies.push(response.to_bytes()),
            TermEvent::SelectionSet { .. } => self.selections += 1,
            TermEvent::Diagnostic(e) => {
                self.diagnostic_count += 1;
                if self.diagnostics.len() < MAX_LISTED_DIAGNOSTICS {
                    self.diagnostics.push(e.to_string());
                }
            }
            TermEvent::TitleChanged(_)
            | TermEvent::IconTitleChanged(_)
            | TermEvent::PaletteChanged { .. }
            | TermEvent::DynamicColorChanged { .. } => {}
        }
    }

    fn print(&self, state: &TerminalState, encoding: EncodingMode) {
        let attrs: Vec<&str> = state.attrs.iter_names().map(|(name, _)| name).collect();

        println!("size:        {}x{}", state.cols, state.rows);
        println!("encoding:    {}", encoding);
        println!(
            "cursor:      row {} col {}{}",
            state.cursor.row + 1,
            state.cursor.col + 1,
            if state.cursor.visible { "" } else { " (hidden)" }
        );
        println!("title:       {:?}", state.title);
        println!("icon title:  {:?}", state.icon_title);
        println!(
            "colors:      fg {} bg {}",
            state.colors.foreground, state.colors.background
        );
        println!(
            "attributes:  {}",
            if attrs.is_empty() { "none".to_string() } else { attrs.join(" ") }
        );
        println!(
            "scroll:      lines {}-{}",
            state.scroll_region.0 + 1,
            state.scroll_region.1 + 1
        );
        println!("modes:       {:?}", state.modes);
        println!(
            "events:      {} printed, {} bells, {} clears, {} erases, {} scrolls, {} selections",
            self.printed, self.bells, self.clears, self.erases, self.scrolls, self.selections
        );
        for reply in &self.replies {
            println!("reply:       {}", String::from_utf8_lossy(reply).escape_debug());
        }
        println!("diagnostics: {}", self.diagnostic_count);
        for diagnostic in &self.diagnostics {
            println!("  {}", diagnostic);
        }
        if self.diagnostic_count > self.diagnostics.len() {
            println!("  ... {} more", self.diagnostic_count - self.diagnostics.len());
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if let Some(encoding) = args.encoding {
        config.encoding = encoding;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.clipboard.sync |= args.clipboard;

    init_logging(&config.log_level);
    info!("vtinterp {} starting...", VERSION);

    let (cols, rows) = match args.size {
        Some(size) => size,
        None => config.terminal.resolve(crossterm::terminal::size().ok()),
    };
    info!("Terminal size: {}x{}, encoding: {}", cols, rows, config.encoding);

    let source: Box<dyn Read + Send> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let mut clipboard = if config.clipboard.sync {
        match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut session = Session::with_encoding(cols, rows, config.encoding);
    session.start(source).context("Failed to start reader thread")?;

    let mut summary = Summary::default();
    let mut read_error = None;

    while !session.has_exited() {
        for event in session.wait_output() {
            match event {
                SessionEvent::Error(e) => {
                    error!("Read failed: {}", e);
                    read_error = Some(e);
                }
                SessionEvent::TitleChanged(title) => info!("Title: {}", title),
                SessionEvent::Output | SessionEvent::Exited => {}
            }
        }

        for event in session.take_events() {
            if let (TermEvent::SelectionSet { data, .. }, Some(clipboard)) = (&event, clipboard.as_mut()) {
                if let Err(e) = clipboard.set_text(String::from_utf8_lossy(data).into_owned()) {
                    warn!("Failed to copy selection: {}", e);
                }
            }
            summary.record(&event);
        }
    }

    summary.print(&session.state, config.encoding);
    info!("vtinterp exiting");

    if let Some(e) = read_error {
        bail!("Read failed: {}", e);
    }
    Ok(())
}
