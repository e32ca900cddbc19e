use std::io;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use crossterm::event::{
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use overbar::app::App;
use overbar::config::{self, CliArgs, Config};
use overbar::error::OverbarError;
use overbar::event::EventHandler;
use overbar::host::{Host, MockHost, SourceKind};
use overbar::overlay::OverlayController;
use overbar::ui;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print!("{}", config::default_config_toml());
        return Ok(());
    }

    install_panic_hook();

    let cfg = config::load(&cli)?;
    let _log_guard = init_logging(&cfg.general.log_level);

    info!("overbar starting");

    let host = build_sim_host(&cfg);

    if cli.list_sources {
        for name in host.source_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let controller = OverlayController::new(host.clone(), cfg.driver_timing());
    controller.configure(&cfg.overlay_settings());

    // ── Terminal setup ────────────────────────────────────────────────
    enable_raw_mode()
        .map_err(|e| OverbarError::Terminal(format!("Failed to enable raw mode: {e}")))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Key release edges need the enhancement protocol; sustain degrades
    // to a toggle without it.
    let release_edges = supports_keyboard_enhancement().unwrap_or(false);
    if release_edges {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut event_handler = EventHandler::new(cfg.tick_interval());
    let mut app = App::new(controller.clone(), host, &cfg, release_edges);

    // ── Main event loop ───────────────────────────────────────────────
    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        if let Some(event) = event_handler.next().await {
            app.handle_event(event);
            if app.should_quit {
                break;
            }
        } else {
            break;
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────
    event_handler.stop();
    controller.shutdown().await;

    if release_edges {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("overbar exiting");
    Ok(())
}

/// The simulated compositor: the configured overlay source, the optional
/// container, and any configured cue sources as playable media.
fn build_sim_host(cfg: &Config) -> Arc<MockHost> {
    let host = Arc::new(MockHost::new());
    host.add_source(
        &cfg.overlay.source,
        SourceKind::Image,
        cfg.simulator.source_width,
    );
    if !cfg.overlay.container_source.is_empty() {
        host.add_source(
            &cfg.overlay.container_source,
            SourceKind::Image,
            cfg.simulator.source_width + 40,
        );
    }
    for cue in [
        &cfg.cues.increase,
        &cfg.cues.decrease,
        &cfg.cues.reset,
        &cfg.cues.full,
    ] {
        if !cue.is_empty() {
            host.add_source(cue, SourceKind::Media, 0);
        }
    }
    host
}

/// Install a panic hook that restores the terminal before printing the panic
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
        default_hook(panic_info);
    }));
    color_eyre::install().ok();
}

/// Initialize tracing to a file in the data directory (a TUI can't log to
/// stdout). Returns the appender guard; dropping it flushes the writer.
fn init_logging(level: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    if level.eq_ignore_ascii_case("off") {
        return None;
    }
    let appender = tracing_appender::rolling::never(Config::log_dir(), "overbar.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
