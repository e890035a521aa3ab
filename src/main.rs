mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tfmirror::config::Config;
use tfmirror::db::Db;
use tfmirror::state::AppState;
use tfmirror::storage::Storage;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::Backup => backup(config).await,
    };

    if let Err(err) = result {
        eprintln!("fatal error: {err}");
        std::process::exit(2);
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let address = tfmirror::config::bind_addr(&config.server);
    let (state, _job_engine) = AppState::build(config).await?;
    tfmirror::server::run(address, state).await
}

async fn migrate(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Db::connect(&config.database).await?;
    println!("migrations applied");
    Ok(())
}

async fn backup(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = Db::connect(&config.database).await?;
    let filename = format!("tfmirror-{}.db", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    let path = config.database.path.parent().unwrap_or_else(|| std::path::Path::new(".")).join(&filename);

    db.backup_to(&path).await?;
    println!("backup written to {}", path.display());

    if let Some(prefix) = &config.database.backup_prefix {
        let storage = Storage::from_config(&config.storage).await?;
        let bytes = tokio::fs::read(&path).await?;
        let key = format!("{}/{filename}", prefix.trim_end_matches('/'));
        storage.upload(&key, bytes, "application/vnd.sqlite3").await?;
        println!("backup uploaded to object store at {key}");
    }

    Ok(())
}
