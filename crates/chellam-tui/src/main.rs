//! chellam-tui — Terminal chat with a live-typing bot.
//! Uses Ratatui + Crossterm for rendering.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tracing::{info, trace, warn};

use chellam_core::config::Config;
use chellam_core::engine::ScriptEngine;
use chellam_core::events::ChatEvent;
use chellam_core::session::ChatSession;

use app::App;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize tracing to a file (not stdout, since we own the terminal)
    let _guard = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(|| -> Box<dyn io::Write> {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open("chellam-tui.log")
            {
                Ok(file) => Box::new(file),
                Err(_) => Box::new(io::sink()),
            }
        })
        .try_init();

    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match Config::load_from_dir(&project_root) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default config: {:#}", e);
            Config {
                project_root: project_root.clone(),
                ..Config::default()
            }
        }
    };

    let brain_dir = config.resolve_brain_dir();
    let engine = match ScriptEngine::load_dir(&brain_dir) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!(
                "Could not load a brain from {}: {}. Add *.yaml rule files there first.",
                brain_dir.display(),
                e
            );
            return Ok(());
        }
    };

    info!("Starting TUI for {}", config.bot_name);

    let mut app = App::new(&config.bot_name);
    let mut session = ChatSession::spawn(config, Arc::new(engine));

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    loop {
        // Draw
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Handle session events (non-blocking)
        while let Ok(event) = session.events.try_recv() {
            if !matches!(event, ChatEvent::CharRevealed(_)) {
                trace!("{}", event.to_json());
            }
            app.handle_event(event);
        }

        if app.should_quit {
            break;
        }

        // Handle terminal events; short poll keeps the reveal smooth
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                match (key.code, key.modifiers) {
                    // Quit
                    (KeyCode::Char('c'), KeyModifiers::CONTROL)
                    | (KeyCode::Char('q'), KeyModifiers::CONTROL) => {
                        session.shutdown();
                        app.should_quit = true;
                    }
                    (KeyCode::Enter, _) => {
                        if let Some(text) = app.take_input() {
                            session.submit(text);
                        }
                    }
                    (KeyCode::Char(c), _) => {
                        app.input.push(c);
                    }
                    (KeyCode::Backspace, _) => {
                        app.input.pop();
                    }
                    // Scroll
                    (KeyCode::PageUp, _) | (KeyCode::Up, _) => app.scroll_up(),
                    (KeyCode::PageDown, _) | (KeyCode::Down, _) => app.scroll_down(),
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    session.join().await;
    info!("Bye");

    Ok(())
}
