//! Fluxo completo: cadastro, ticks com alvos saudáveis e quebrados,
//! parada e remoção, usando apenas a API pública da crate.

use axum::{Router, http::StatusCode, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url_keepalive::error::MonitorError;
use url_keepalive::ping::PingExecutor;
use url_keepalive::registry::Registry;
use url_keepalive::scheduler::Scheduler;
use url_keepalive::storage::MemoryStorage;
use url_keepalive::types::{Target, TargetsView};

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/healthy", get(|| async { "ok" }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn find(targets: &[Target], url: &str) -> Target {
    targets.iter().find(|t| t.url == url).cloned().unwrap()
}

#[tokio::test]
async fn full_keepalive_lifecycle() {
    let addr = spawn_upstream().await;
    let healthy = format!("http://{addr}/healthy");
    let broken = format!("http://{addr}/broken");
    let idle = format!("http://{addr}/healthy?idle");

    let registry = Arc::new(Registry::new(
        Arc::new(MemoryStorage::new()),
        Duration::from_millis(5),
    ));
    registry.start(&healthy).await.unwrap();
    registry.start(&broken).await.unwrap();
    registry.add(&idle).await.unwrap();
    registry.add(&idle).await.unwrap();

    let executor = PingExecutor::new(Duration::from_secs(5), Duration::from_millis(1)).unwrap();
    let scheduler = Scheduler::new(registry.clone(), executor, Duration::from_secs(300));
    for cycle in 1..=2 {
        let report = scheduler.run_tick(cycle).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
    }

    let all = registry.list_all().await.unwrap();
    assert_eq!(all.len(), 3);
    let h = find(&all, &healthy);
    assert_eq!((h.total_requests, h.request_count), (2, 2));
    let b = find(&all, &broken);
    assert_eq!((b.total_requests, b.request_count), (2, 0));
    assert_eq!(find(&all, &idle), Target::new(idle.clone()));
    assert!(all.iter().all(|t| t.total_requests >= t.request_count));

    let view = TargetsView::from(all.as_slice());
    assert_eq!(view.urls, vec![healthy.clone(), broken.clone(), idle.clone()]);

    let stopped = registry.stop(&broken).await.unwrap();
    assert!(!stopped.active);
    assert_eq!((stopped.total_requests, stopped.request_count), (0, 0));
    assert!(matches!(
        registry.stop("http://never.example/").await,
        Err(MonitorError::NotFound(_))
    ));

    assert!(registry.delete(&healthy).await.unwrap());
    let remaining: Vec<String> = registry
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.url)
        .collect();
    assert_eq!(remaining, vec![broken, idle]);
}
