//! todo-server: Todo REST API binary
//!
//! Reads configuration from the environment (and `.env` if present), opens
//! the configured store, and serves until Ctrl-C or SIGTERM. Any startup
//! failure exits with a non-zero status.

use mimalloc::MiMalloc;
use std::process::ExitCode;
use std::sync::Arc;
use todo_core::{Config, MemoryStore, Result, Server, ServerConfig, StoreConfig, TodoStore};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    // Before the logger so RUST_LOG can come from .env
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => log::info!("loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => {
            log::error!("failed to load .env: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = Config::from_env()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    match config.store {
        StoreConfig::Memory => start(&config.server, MemoryStore::new()).await,
        #[cfg(feature = "mongodb")]
        StoreConfig::MongoDb(ref mongo) => {
            let store = todo_core::MongoStore::connect(mongo).await?;
            start(&config.server, store).await
        }
        #[cfg(not(feature = "mongodb"))]
        StoreConfig::MongoDb(_) => Err(todo_core::Error::Config(
            "TODO_STORE=mongodb but this binary was built without the `mongodb` feature".to_string(),
        )),
    }
}

async fn start<S: TodoStore>(config: &ServerConfig, store: S) -> Result<()> {
    store.ping().await?;
    log::info!("{} store ready", store.name());

    let server = Server::bind(config, Arc::new(store)).await?;
    log::info!("listening on http://{}", server.local_addr()?);

    server.run(shutdown_signal()).await?;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    log::info!("shutdown signal received");
}
