use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use r2p_core::adapters::PostgresTransactionRepository;
use r2p_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use r2p_core::config::{Config, LogFormat};
use r2p_core::{db, services, AppState};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn connect(config: &Config, migrate: bool) -> anyhow::Result<AppState> {
    let pool = db::create_pool(config).await?;
    if migrate {
        db::run_migrations(&pool).await?;
    }
    let repository = Arc::new(PostgresTransactionRepository::new(pool));
    AppState::build(config, repository)
}

async fn run_worker(config: &Config, state: AppState) -> anyhow::Result<()> {
    let sweeper = tokio::spawn(services::run_expiry_sweeper(
        Arc::clone(&state.engine),
        config.expiry_sweep_interval,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    sweeper.abort();

    match state.metrics.render() {
        Ok(text) => tracing::info!("Operation counters at shutdown:\n{}", text),
        Err(e) => tracing::warn!("Failed to render operation counters: {}", e),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Worker) {
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Worker => {
            let state = connect(&config, true).await?;
            run_worker(&config, state).await
        }
        Commands::Notify { file } => {
            let state = connect(&config, false).await?;
            cli::handle_notify(&state, &file).await
        }
        Commands::Tx(TxCommands::Show { payment_request_id }) => {
            let state = connect(&config, false).await?;
            cli::handle_tx_show(&state, &payment_request_id).await
        }
        Commands::Tx(TxCommands::Refunds { payment_request_id }) => {
            let state = connect(&config, false).await?;
            cli::handle_tx_refunds(&state, &payment_request_id).await
        }
    }
}
