use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url_keepalive::{
    api, config,
    ping::PingExecutor,
    registry::Registry,
    scheduler::Scheduler,
    storage::{MemoryStorage, Storage, TargetStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing), nível via RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::load()?;
    config.validate().map_err(anyhow::Error::msg)?;
    info!("Configuração carregada: {:?}", config);

    // Store durável; `memory://` só para execução local
    let store: Arc<dyn TargetStore> = if config.database_url.starts_with("memory://") {
        info!("Usando store em memória (não durável).");
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(Storage::connect(&config.database_url).await?)
    };
    store.ensure_schema().await?;
    info!("Banco de dados conectado");

    let registry = Arc::new(Registry::new(store, config.settle_delay()));
    let executor = PingExecutor::new(config.request_timeout(), config.pacing_delay())?;
    let scheduler =
        Scheduler::new(Arc::clone(&registry), executor, config.tick_interval()).spawn();

    let http_addr: SocketAddr = config.listen_addr.parse()?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Sinal de encerramento recebido.");
    };
    let served = api::run_http_server(registry, http_addr, shutdown).await;

    scheduler.shutdown().await;
    served
}
