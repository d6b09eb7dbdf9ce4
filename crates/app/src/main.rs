use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use services::{Clock, GameController, RoundHistoryService};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod terminal;

use config::{Cli, Settings};
use terminal::{Command, HELP};

const HISTORY_LIMIT: u32 = 10;
const STATS_WINDOW: u32 = 500;

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    // Game text goes to stdout; keep logs out of it.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_storage(settings: &Settings) -> anyhow::Result<Storage> {
    if settings.uses_memory_storage() {
        info!("using in-memory storage; progress will not be saved");
        return Ok(Storage::in_memory());
    }
    let url = config::prepare_database_url(&settings.database_url)?;
    let storage = Storage::sqlite(&url)
        .await
        .with_context(|| format!("failed to open database '{url}'"))?;
    info!(database_url = %url, "storage ready");
    Ok(storage)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli)?;
    let catalog = Arc::new(settings.catalog()?);
    let storage = open_storage(&settings).await?;

    let mut game = GameController::load_from(catalog, Clock::system(), &storage)
        .await
        .context("failed to load saved progress")?
        .with_auto_restart(settings.restart_delay());
    if let Some(seed) = settings.seed {
        game = game.with_seed(seed);
    }
    let history = RoundHistoryService::from_storage(&storage);
    let mut restarts = game
        .take_restart_events()
        .context("restart events already taken")?;

    println!("{HELP}\n");
    let view = game.start_round(None).await?;
    println!("{}", terminal::render_view(&view));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                handle_command(&mut game, &history, command).await;
            }
            Some(tick) = restarts.recv() => {
                if let Some(view) = game.handle_restart(tick) {
                    println!("\n{}", terminal::render_view(&view));
                }
            }
        }
    }

    println!("Final score: {}", game.session().score());
    Ok(())
}

async fn handle_command(
    game: &mut GameController,
    history: &RoundHistoryService,
    command: Command,
) {
    match command {
        Command::Guess(raw) => match game.submit_guess(&raw).await {
            Ok(report) => {
                println!("{}", terminal::render_view(&report.view));
                if let Some(level) = report.advance_offer() {
                    println!("Ready for more? Type :level {level} to move on.");
                }
            }
            Err(_) => println!("{}", game.feedback()),
        },
        Command::Level(level) => match game.change_level(level).await {
            Ok(view) => println!("{}", terminal::render_view(&view)),
            Err(_) => println!("{}", game.feedback()),
        },
        Command::Restart => match game.play_again().await {
            Ok(view) => println!("{}", terminal::render_view(&view)),
            Err(_) => println!("{}", game.feedback()),
        },
        Command::Levels => println!("{}", terminal::render_levels(&game.view())),
        Command::History => {
            let level = game.session().current_level();
            let listed = history.recent(None, HISTORY_LIMIT).await;
            let stats = history.stats(Some(level), STATS_WINDOW).await;
            match (listed, stats) {
                (Ok(items), Ok(stats)) => {
                    println!("{}", terminal::render_history(&items, &stats));
                }
                (Err(err), _) | (_, Err(err)) => {
                    warn!(error = %err, "failed to read round history");
                    println!("History is unavailable right now.");
                }
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    run(cli).await
}
