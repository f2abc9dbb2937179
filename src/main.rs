use std::io;

use dotenv::dotenv;
use sokobot::config::Config;
use sokobot::infra::{DefaultObserver, JudgeConnection};
use sokobot::planners::{Game, GameError};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sokobot=info,warn"));

    // stdout belongs to the judge
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        strategy = ?config.strategy,
        heuristic = %config.heuristic,
        distance = ?config.distance,
        max_memory_mb = config.max_memory_mb,
        "Starting"
    );

    let debug = config.debug;
    let connection = JudgeConnection::new(io::stdin().lock(), io::stdout(), config.replays_folder.clone());
    let mut game = Game::new(connection, DefaultObserver, config);

    match game.run() {
        Ok(outcome) => tracing::info!(?outcome, "Done"),
        Err(GameError::Parse(e)) if !debug => eprintln!("{}", e),
        Err(GameError::Conflict(e)) => tracing::error!(error = %e, "Giving up on level"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
