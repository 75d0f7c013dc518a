mod api;
mod app;
mod cli;
mod config;
mod error;
mod input;
mod loader;
mod model;
mod normalize;
mod session;
mod sort;
mod table;
mod ui;

use anyhow::{Context, Result};
use api::{ApiGateway, HttpTransport};
use app::App;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use loader::{Completion, Dispatcher};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use session::{GateState, MarkerFileStore, SessionGate};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let settings = Settings::load(&args)?;
    match &settings.source {
        Some(source) => info!("loaded config from {source}"),
        None => debug!("no config file found, using defaults"),
    }
    info!("dashboard API at {}", settings.server);

    let transport = HttpTransport::new(&settings.server, settings.timeout)?;
    let gateway = ApiGateway::new(Arc::new(transport));
    let store = settings
        .session_dir
        .clone()
        .map(MarkerFileStore::new)
        .unwrap_or_else(MarkerFileStore::discover);
    let gate = SessionGate::open(Box::new(store));

    let mut app = App::new(gate, settings.namespace.clone());
    let (tx, rx) = mpsc::unbounded_channel::<Completion>();
    let dispatcher = Dispatcher::new(gateway, tx);

    dispatcher.execute(app.startup());
    if let Some(path) = args.kubeconfig.clone()
        && app.gate_state() == GateState::Locked
    {
        dispatcher.execute(app.upload_file(path));
    }

    run(&mut app, &dispatcher, rx).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    // Stdout is owned by the TUI; logs go to --log-file or nowhere.
    let _ = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::sink).try_init(),
    };

    Ok(())
}

async fn run(
    app: &mut App,
    dispatcher: &Dispatcher,
    rx: mpsc::UnboundedReceiver<Completion>,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, dispatcher, rx).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    dispatcher: &Dispatcher,
    mut rx: mpsc::UnboundedReceiver<Completion>,
) -> Result<()> {
    let mut reader = EventStream::new();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let action = if app.has_pending_confirmation() {
                            input::confirmation_key(key).or_else(|| input::map_key(app.mode(), key))
                        } else {
                            input::map_key(app.mode(), key)
                        };
                        if let Some(action) = action {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            dispatcher.execute(command);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_completion = rx.recv() => {
                if let Some(completion) = maybe_completion {
                    let command = app.apply_completion(completion);
                    dispatcher.execute(command);
                }
            }
        }
    }

    Ok(())
}
