use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use ragchat_cli::api::ApiClient;
use ragchat_cli::app::App;
use ragchat_cli::config::Config;
use ragchat_cli::{handler, tui, ui};

/// Logs go to a file; stderr is owned by the terminal UI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ragchat");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("ragchat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Arc::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::default());

    if let Err(err) = init_logging() {
        eprintln!("warning: logging disabled: {err}");
    }
    tracing::info!("starting ragchat against {}", config.api_url);

    let client = ApiClient::new(
        &config.api_url,
        config.max_retries,
        Duration::from_millis(config.retry_delay_ms),
    );
    let mut app = App::new(&config, client);

    // Populate the stats strip and health indicator before the first draw
    app.refresh_status().await;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        app.poll_query_task().await;
    }

    Ok(())
}
