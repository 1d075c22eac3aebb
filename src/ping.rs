//! ping.rs — Execução sequencial dos pings HTTP de um tick
//!
//! Um alvo por vez, nunca em paralelo, com pacing fixo entre alvos.
//! A falha de um alvo não interrompe os demais.

use crate::error::{MonitorError, PingFailure};
use crate::registry::Registry;
use crate::types::{Target, TickReport};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

pub struct PingExecutor {
    client: Client,
    pacing_delay: Duration,
}

impl PingExecutor {
    pub fn new(request_timeout: Duration, pacing_delay: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            pacing_delay,
        })
    }

    /// GET na URL. Considera OK qualquer status 2xx ou 3xx.
    pub async fn ping(&self, url: &str) -> Result<(), PingFailure> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(PingFailure::Status(status))
        }
    }

    /// Processa o snapshot do tick em ordem.
    ///
    /// Todo membro do snapshot recebe o GET, mesmo que tenha sido parado ou
    /// removido depois do snapshot; nesse caso nenhum contador é escrito.
    /// Falha do store aborta o restante do tick.
    pub async fn run(&self, registry: &Registry, targets: &[Target]) -> TickReport {
        let mut report = TickReport::default();

        for (idx, target) in targets.iter().enumerate() {
            let url = target.url.as_str();

            // 1. A tentativa é contada antes do request
            let counted = match registry.record_attempt(url).await {
                Ok(()) => true,
                Err(MonitorError::NotFound(_)) | Err(MonitorError::Conflict(_)) => {
                    debug!(url, "Alvo parado ou removido durante o tick, contadores intactos.");
                    report.uncounted += 1;
                    false
                }
                Err(e) => {
                    error!(url, "Erro ao registrar tentativa, tick abortado: {:?}", e);
                    report.aborted = true;
                    break;
                }
            };
            report.attempted += 1;

            // 2. Ping
            let started = Instant::now();
            match self.ping(url).await {
                Ok(()) => {
                    report.succeeded += 1;
                    debug!(url, elapsed = ?started.elapsed(), "Ping OK.");
                    // 3. Sucesso
                    if counted {
                        match registry.increment_success_counter(url).await {
                            Ok(()) => {}
                            Err(MonitorError::StoreUnavailable(e)) => {
                                error!(url, "Erro ao atualizar contador, tick abortado: {}", e);
                                report.aborted = true;
                                break;
                            }
                            Err(e) => warn!(url, "Contador de sucesso não atualizado: {}", e),
                        }
                    }
                }
                Err(failure) => {
                    // 4. Falha isolada
                    report.failed += 1;
                    warn!(url, elapsed = ?started.elapsed(), "Falha no ping: {}", failure);
                }
            }

            // 5. Pacing
            self.pace(idx, targets.len()).await;
        }

        report
    }

    async fn pace(&self, idx: usize, len: usize) {
        if idx + 1 < len {
            sleep(self.pacing_delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, TargetStore};
    use async_trait::async_trait;
    use axum::{
        Router,
        extract::{Path, State},
        http::StatusCode,
        routing::get,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    type Hits = Arc<Mutex<Vec<String>>>;

    /// Servidor local com `/ok` (200), `/fail` (500) e `/moved` (308 -> /ok).
    pub(crate) async fn spawn_test_server() -> SocketAddr {
        let app = Router::new()
            .route("/ok", get(|| async { "pong" }))
            .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route(
                "/moved",
                get(|| async { axum::response::Redirect::permanent("/ok") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Servidor que registra, em ordem, cada `/hit/{name}` recebido.
    async fn spawn_recording_server() -> (SocketAddr, Hits) {
        let hits: Hits = Arc::default();
        let app = Router::new()
            .route("/hit/{name}", get(record_hit))
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hits)
    }

    async fn record_hit(State(hits): State<Hits>, Path(name): Path<String>) -> &'static str {
        hits.lock().await.push(name);
        "ok"
    }

    fn executor() -> PingExecutor {
        PingExecutor::new(Duration::from_secs(5), Duration::from_millis(1)).unwrap()
    }

    async fn target(registry: &Registry, url: &str) -> Target {
        registry
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.url == url)
            .unwrap()
    }

    #[tokio::test]
    async fn ping_classifies_status_codes() {
        let addr = spawn_test_server().await;
        let executor = executor();

        assert!(executor.ping(&format!("http://{addr}/ok")).await.is_ok());
        assert!(executor.ping(&format!("http://{addr}/moved")).await.is_ok());
        assert!(matches!(
            executor.ping(&format!("http://{addr}/fail")).await,
            Err(PingFailure::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[tokio::test]
    async fn failure_is_isolated_from_next_target() {
        let addr = spawn_test_server().await;
        let registry = Registry::new(Arc::new(MemoryStorage::new()), Duration::from_millis(1));
        let fail = format!("http://{addr}/fail");
        let ok = format!("http://{addr}/ok");
        registry.start(&fail).await.unwrap();
        registry.start(&ok).await.unwrap();

        let snapshot = registry.list_active().await.unwrap();
        let report = executor().run(&registry, &snapshot).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let a = target(&registry, &fail).await;
        assert_eq!(a.total_requests, 1);
        assert_eq!(a.request_count, 0);
        let b = target(&registry, &ok).await;
        assert_eq!(b.total_requests, 1);
        assert_eq!(b.request_count, 1);
    }

    #[tokio::test]
    async fn unreachable_host_counts_as_failure() {
        let registry = Registry::new(Arc::new(MemoryStorage::new()), Duration::from_millis(1));
        // Porta 9 (discard) em loopback: conexão recusada
        let url = "http://127.0.0.1:9/";
        registry.start(url).await.unwrap();

        let snapshot = registry.list_active().await.unwrap();
        let report = executor().run(&registry, &snapshot).await;

        assert_eq!(report.failed, 1);
        let t = target(&registry, url).await;
        assert_eq!(t.total_requests, 1);
        assert_eq!(t.request_count, 0);
    }

    #[tokio::test]
    async fn targets_stopped_after_snapshot_are_still_pinged() {
        let (addr, hits) = spawn_recording_server().await;
        let registry = Registry::new(Arc::new(MemoryStorage::new()), Duration::from_millis(1));
        let stopped = format!("http://{addr}/hit/stopped");
        let deleted = format!("http://{addr}/hit/deleted");
        registry.start(&stopped).await.unwrap();
        registry.start(&deleted).await.unwrap();

        let snapshot = registry.list_active().await.unwrap();
        registry.stop(&stopped).await.unwrap();
        registry.delete(&deleted).await.unwrap();
        let report = executor().run(&registry, &snapshot).await;

        assert_eq!(*hits.lock().await, vec!["stopped", "deleted"]);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.uncounted, 2);
        assert!(!report.aborted);

        let t = target(&registry, &stopped).await;
        assert!(!t.active);
        assert_eq!((t.total_requests, t.request_count), (0, 0));
        assert_eq!(registry.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pacing_spaces_requests_in_snapshot_order() {
        let (addr, hits) = spawn_recording_server().await;
        let registry = Registry::new(Arc::new(MemoryStorage::new()), Duration::from_millis(1));
        for name in ["c", "a", "b"] {
            registry
                .start(&format!("http://{addr}/hit/{name}"))
                .await
                .unwrap();
        }

        let executor = PingExecutor::new(Duration::from_secs(5), Duration::from_millis(50)).unwrap();
        let snapshot = registry.list_active().await.unwrap();
        let started = Instant::now();
        let report = executor.run(&registry, &snapshot).await;

        // dois intervalos entre três alvos
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(report.succeeded, 3);
        assert_eq!(*hits.lock().await, vec!["c", "a", "b"]);
    }

    /// Store cujo incremento de tentativas falha como se o banco caísse.
    struct OfflineCounters(MemoryStorage);

    #[async_trait]
    impl TargetStore for OfflineCounters {
        async fn ensure_schema(&self) -> crate::error::Result<()> {
            self.0.ensure_schema().await
        }
        async fn insert_if_absent(&self, url: &str) -> crate::error::Result<bool> {
            self.0.insert_if_absent(url).await
        }
        async fn list_targets(&self) -> crate::error::Result<Vec<Target>> {
            self.0.list_targets().await
        }
        async fn list_active(&self) -> crate::error::Result<Vec<Target>> {
            self.0.list_active().await
        }
        async fn get_target(&self, url: &str) -> crate::error::Result<Option<Target>> {
            self.0.get_target(url).await
        }
        async fn activate(&self, url: &str, start_time: i64) -> crate::error::Result<Target> {
            self.0.activate(url, start_time).await
        }
        async fn ensure_active(&self, url: &str, start_time: i64) -> crate::error::Result<Target> {
            self.0.ensure_active(url, start_time).await
        }
        async fn deactivate(&self, url: &str) -> crate::error::Result<Option<Target>> {
            self.0.deactivate(url).await
        }
        async fn increment_total_requests(&self, _url: &str) -> crate::error::Result<bool> {
            Err(MonitorError::StoreUnavailable("connection reset".into()))
        }
        async fn increment_request_count(&self, url: &str) -> crate::error::Result<bool> {
            self.0.increment_request_count(url).await
        }
        async fn delete_target(&self, url: &str) -> crate::error::Result<bool> {
            self.0.delete_target(url).await
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_the_rest_of_the_tick() {
        let (addr, hits) = spawn_recording_server().await;
        let registry = Registry::new(
            Arc::new(OfflineCounters(MemoryStorage::new())),
            Duration::from_millis(1),
        );
        registry.start(&format!("http://{addr}/hit/a")).await.unwrap();
        registry.start(&format!("http://{addr}/hit/b")).await.unwrap();

        let snapshot = registry.list_active().await.unwrap();
        let report = executor().run(&registry, &snapshot).await;

        assert!(report.aborted);
        assert_eq!(report.attempted, 0);
        assert!(hits.lock().await.is_empty());
    }
}
