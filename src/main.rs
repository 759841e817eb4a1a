// shadowfp: precision blame over recorded callback traces

use std::io;
use std::process::ExitCode;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_subscriber::EnvFilter;

use shadowfp::analysis::blame::BlameReport;
use shadowfp::config::Config;
use shadowfp::debuginfo::DebugInfoMap;
use shadowfp::session::{Session, SessionError};
use shadowfp::trace;
use shadowfp::ui::App;

/// Exit status for a run the shadow model could not follow
const EXIT_FATAL: u8 = 5;

fn usage(program: &str) {
    eprintln!(
        "Usage: {} <trace-file> [--debug-info <path>] [--poi <iid>] [--precision <bits>] [--nan] [--tui]",
        program
    );
    eprintln!();
    eprintln!("  --debug-info <path>  location table (default: $SHADOWFP_LOG_DIR/debug.bin)");
    eprintln!("  --poi <iid>          report root (default: last floating operation)");
    eprintln!("  --precision <bits>   mantissa bits: 23, 27, 33, 39, 45 or 52 (default 52)");
    eprintln!("  --nan                log NaN loads and stores");
    eprintln!("  --tui                browse the report interactively");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shadowfp=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "shadowfp".to_string());

    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            usage(&program);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.shadow_error().is_some() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(config: &Config) -> Result<(), SessionError> {
    let entries = trace::load(&config.trace)?;
    let mut session = Session::from_config(config)?;
    let report = session.run(&entries)?;

    let Some(report) = report else {
        eprintln!("No floating-point operations were executed; nothing to report.");
        return Ok(());
    };

    if config.tui {
        if let Err(e) = browse(report, session.into_debug_info()) {
            eprintln!("Error: {:?}", e);
        }
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn browse(report: BlameReport, debug_info: DebugInfoMap) -> io::Result<()> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(report, debug_info);
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}
