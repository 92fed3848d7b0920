mod cli;

use crate::cli::{StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use keyhole_gateway::telemetry::init_tracing;
use keyhole_gateway::{App, AppState};
use keyhole_redirector::RedirectorService;
use keyhole_shortener::ShortenerService;
use keyhole_storage::{InMemoryRepository, MySqlRepository, Repository, SqliteRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    config.validate()?;
    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        public_host = %config.public_host,
        "starting gateway server"
    );

    match config.storage {
        StorageBackendArg::InMemory => run_server(&config, InMemoryRepository::new()).await,
        StorageBackendArg::Sqlite => {
            let repository = SqliteRepository::connect(&config.sqlite_url).await?;
            repository.provision_schema().await?;
            run_server(&config, repository).await
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn).await?;
            repository.provision_schema().await?;
            run_server(&config, repository).await
        }
    }
}

async fn run_server<R: Repository + Clone>(config: &CLI, repository: R) -> anyhow::Result<()> {
    let shortener = ShortenerService::new(repository.clone(), config.shortener_config());
    let redirector = RedirectorService::new(repository);
    let app = App::router(AppState::new(Arc::new(shortener), Arc::new(redirector)));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
