mod app;
mod convo;
mod keys;
mod net;
mod tabs;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::{drain_actions, ActionQueue, ChatApp};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use hubbub_core::client::Client;
use hubbub_core::event::NetworkEvent;
use hubbub_notify::{GdbusSink, Notifier};
use keys::{parse_chord, KeyBindings, KeyChord};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Terminal chat client: multiplexes live conversations into tabs and
/// raises replaceable desktop notifications for unfocused ones.
#[derive(Debug, Parser)]
#[command(name = "hubbub", version)]
struct Args {
    /// Log file path (logging is disabled when unset)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log detailed debugging messages
    #[arg(short, long)]
    debug: bool,

    /// Roster snapshot to load (JSON); a built-in demo roster is used
    /// when unset
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Keybinding for next tab
    #[arg(long, default_value = "ctrl-d", value_parser = parse_chord)]
    key_next_tab: KeyChord,

    /// Keybinding for previous tab
    #[arg(long, default_value = "ctrl-u", value_parser = parse_chord)]
    key_prev_tab: KeyChord,

    /// Colour scheme to use
    #[arg(
        long,
        default_value = "default",
        value_parser = clap::builder::PossibleValuesParser::new(theme::SCHEME_NAMES)
    )]
    col_scheme: String,

    /// Upper bound on one notification sink invocation, in milliseconds
    #[arg(long, default_value_t = 5000)]
    notify_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let palette = theme::scheme(&args.col_scheme)
        .with_context(|| format!("unknown colour scheme {:?}", args.col_scheme))?;
    let bindings = KeyBindings {
        next_tab: args.key_next_tab,
        prev_tab: args.key_prev_tab,
    };
    let roster = match &args.roster {
        Some(path) => net::load_roster(path)?,
        None => net::sample_roster(),
    };

    let (mut net_rx, out_tx) = net::spawn_loopback(roster);
    let client = Rc::new(Client::new());
    let notifier = Notifier::spawn(GdbusSink::new(Duration::from_millis(
        args.notify_timeout_ms,
    )));
    let actions: ActionQueue = Rc::new(RefCell::new(VecDeque::new()));
    let app = Rc::new(RefCell::new(ChatApp::new(
        bindings,
        palette,
        Rc::clone(&actions),
    )));
    app::wire(&app, &client, notifier, out_tx);

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &app, &client, &actions, &mut net_rx).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &Rc<RefCell<ChatApp>>,
    client: &Rc<Client>,
    actions: &ActionQueue,
    net_rx: &mut mpsc::UnboundedReceiver<NetworkEvent>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        drain_actions(app, actions);
        terminal.draw(|frame| ui::render(frame, &app.borrow()))?;

        tokio::select! {
            maybe_event = net_rx.recv() => {
                if let Some(event) = maybe_event {
                    // An observer failure here is a programming defect;
                    // recoverable errors never surface through dispatch.
                    client.dispatch(event)?;
                }
            }
            maybe_key = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_key {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        app.borrow_mut().handle_key(client, key);
                    }
                }
            }
        }

        if app.borrow().should_quit {
            break;
        }
    }

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let default_level = if args.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let Some(path) = &args.log else {
        // Raw-mode terminal owns stdout; without a file, drop log output.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
        return Ok(());
    };

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .try_init();
    Ok(())
}
