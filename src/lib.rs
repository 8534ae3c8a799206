mod cli;
pub mod db;
pub mod error;
pub mod routes;
mod utils;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use db::{Database, OpenOptions, APP_VERSION, SCHEMA_VERSION};
use error::AppResult;
use routes::AppState;

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .compact()
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

async fn serve(cli: Cli) -> AppResult<()> {
    if cli.is_ephemeral() {
        warn!("using an in-memory database, captures are lost on exit");
    }

    // Migration finishes before the listener accepts anything.
    let db = Arc::new(Database::connect(
        &cli.database,
        &OpenOptions {
            trace_sql: cli.debug,
            ..OpenOptions::default()
        },
    )?);

    let listener = tokio::net::TcpListener::bind(cli.bind.as_str()).await?;
    info!(bind = %cli.bind, "listening");

    let app = routes::router(AppState { db: db.clone() });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close()?;
    Ok(())
}

pub fn run() {
    let cli = Cli::parse();
    if cli.version {
        println!("clipboard-archive {APP_VERSION} (schema {SCHEMA_VERSION})");
        return;
    }

    init_tracing(cli.debug);
    info!(version = APP_VERSION, "starting clipboard archive");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(serve(cli)) {
        error!("{err}");
        std::process::exit(1);
    }
    info!("bye");
}
