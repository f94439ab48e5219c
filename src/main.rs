mod api;
mod app;
mod board;
mod config;
mod drag;
mod dto;
mod error;
mod fetch;
mod models;
mod parser;
mod poll;
mod reconcile;
mod repository;
#[cfg(test)]
mod testing;
mod ui;

use crate::api::FizzyClient;
use crate::app::App;
use crate::config::Config;
use crate::repository::ApiRepository;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(log_file: &Path) -> io::Result<()> {
    if let Some(dir) = log_file.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fizzy_tui=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_logging(&config.log_file)?;
    tracing::info!(instance = %config.instance_url, "starting fizzy-tui");

    let client = FizzyClient::new(
        &config.instance_url,
        &config.api_token,
        config.account_slug.as_deref(),
    )?;
    let repo = Arc::new(ApiRepository::new(client));
    let mut app = App::new(repo, config.poll_interval);
    match &config.board_id {
        Some(board_id) => app.open_board(board_id),
        None => app.load_boards().await,
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
