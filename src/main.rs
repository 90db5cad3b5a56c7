//! termcore - run a shell inside a minimal terminal emulator
//!
//! Hosts one session in the current terminal: child output is interpreted
//! into a cell grid, and the grid is painted back onto the host screen.
//!
//! ```text
//! termcore                       # $SHELL (or cmd.exe on Windows)
//! termcore -s /bin/bash -- -l    # explicit program and arguments
//! termcore --size 100x30
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use termcore::config::{self, Config};
use termcore::core::pty::PtySize;
use termcore::core::session::{Session, SessionContext, SessionEvent};
use termcore::ui::{KeyMapper, Renderer};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on PTY reads per loop iteration so input stays responsive
const MAX_READS_PER_TICK: usize = 64;

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    shell: Option<String>,
    args: Vec<String>,
    size: Option<(u16, u16)>,
    config_path: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(Options),
    Help,
    Version,
}

fn print_help() {
    eprintln!("termcore {} - minimal terminal emulator", VERSION);
    eprintln!();
    eprintln!("Usage: termcore [OPTIONS] [-- ARGS...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <PROGRAM>   Program to run (default: $SHELL or %COMSPEC%)");
    eprintln!("      --size <COLSxROWS>  Initial grid size");
    eprintln!("      --config <PATH>     Config file (default: ~/.termcore/config.toml)");
    eprintln!("  -v, --version           Show version");
    eprintln!("  -h, --help              Show this help");
    eprintln!();
    eprintln!("Arguments after -- are passed to the program.");
}

fn parse_size(value: &str) -> Option<(u16, u16)> {
    let (cols, rows) = value.split_once(['x', 'X'])?;
    let cols = cols.trim().parse::<u16>().ok()?;
    let rows = rows.trim().parse::<u16>().ok()?;
    (cols > 0 && rows > 0).then_some((cols, rows))
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-s" | "--shell" => {
                let shell = args.next().ok_or("Missing shell argument")?;
                options.shell = Some(shell);
            }
            "--size" => {
                let value = args.next().ok_or("Missing size argument")?;
                let size =
                    parse_size(&value).ok_or_else(|| format!("Invalid size: {}", value))?;
                options.size = Some(size);
            }
            "--config" => {
                let path = args.next().ok_or("Missing config path")?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--" => {
                options.args.extend(args.by_ref());
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
    }

    Ok(Command::Run(options))
}

fn init_logging(config: &Config) {
    let log_path = config::config_dir()
        .map(|dir| dir.join("termcore.log"))
        .unwrap_or_else(|| PathBuf::from("termcore.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("TERMCORE_LOG")
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            eprintln!("termcore {}", VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // An explicit --config must load; the default location may be broken
    let (config, config_error) = match &options.config_path {
        Some(path) => (Config::load_from(path)?, None),
        None => match Config::config_path() {
            Some(path) => Config::load_lenient(&path),
            None => (Config::default(), None),
        },
    };

    init_logging(&config);
    info!("termcore {} starting", VERSION);
    if let Some(e) = config_error {
        warn!("{}; using defaults", e);
    }

    run_terminal(options, config)
}

fn run_terminal(options: Options, config: Config) -> anyhow::Result<()> {
    // Command line overrides the config file
    let program = options.shell.unwrap_or_else(|| config.shell_program());
    let args = if options.args.is_empty() {
        config.args.clone()
    } else {
        options.args
    };

    let (cols, rows) = options
        .size
        .or_else(|| crossterm::terminal::size().ok())
        .unwrap_or((config.cols, config.rows));
    let size = PtySize::new(cols, rows);
    info!("Program: {} {:?}, size {}x{}", program, args, size.cols, size.rows);

    let (tx, rx) = mpsc::channel();
    let ctx = SessionContext {
        events: tx,
        read_chunk_size: config.read_chunk_size,
        scrollback_limit: config.scrollback_lines,
    };

    let mut session: Session = Session::start(ctx, size, &program, &args).map_err(|e| {
        error!("Failed to start {}: {}", program, e);
        e
    })?;

    let mut renderer = Renderer::new();
    renderer.init().context("Failed to initialize the host terminal")?;

    let result = run_main_loop(&mut session, &rx, &mut renderer);

    session.close();
    let _ = renderer.cleanup();

    result
}

fn run_main_loop(
    session: &mut Session,
    events: &Receiver<SessionEvent>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);
    renderer.render(&session.state.grid)?;

    loop {
        for _ in 0..MAX_READS_PER_TICK {
            if session.on_readable() == 0 {
                break;
            }
        }

        // Repaints are coalesced into one render per iteration
        let mut repaint = false;
        for event in events.try_iter() {
            match event {
                SessionEvent::Repaint => repaint = true,
                SessionEvent::Exited => {
                    info!("Session ended");
                    return Ok(());
                }
            }
        }
        if repaint {
            renderer.render(&session.state.grid)?;
        }

        if event::poll(poll_timeout)? {
            match event::read()? {
                Event::Key(key_event) => {
                    if let Some(action) = KeyMapper::map(&key_event) {
                        session.send_key(action);
                    }
                }
                Event::Resize(cols, rows) => {
                    if let Err(e) = session.resize(cols, rows) {
                        warn!("Failed to resize pty: {}", e);
                    }
                    renderer.invalidate();
                    renderer.render(&session.state.grid)?;
                }
                _ => {}
            }
        }
    }
}
