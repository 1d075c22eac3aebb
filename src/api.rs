//! api.rs — Superfície HTTP de comandos e consulta
//!
//! `POST /api/urls` recebe `{ url, action }` e `GET /api/urls` devolve os
//! mapas paralelos URL -> campo para exibição em tabela.
//!
//! Status de erro: 400 para URL inválida, 404 para URL desconhecida
//! (`stop`, `delete`, `counter`), 503 quando o store está fora. A ação
//! `counter` responde 409 quando o alvo existe mas está parado, ou quando o
//! incremento deixaria `counters` acima de `totalRequests`.

use crate::error::MonitorError;
use crate::registry::Registry;
use crate::types::TargetsView;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub url: String,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Start,
    Stop,
    Delete,
    Counter,
    /// Ação ausente ou desconhecida: cadastra se preciso e ativa.
    Upsert,
}

impl Action {
    pub fn parse(action: Option<&str>) -> Self {
        match action {
            Some("add") => Action::Add,
            Some("start") => Action::Start,
            Some("stop") => Action::Stop,
            Some("delete") => Action::Delete,
            Some("counter") => Action::Counter,
            _ => Action::Upsert,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub message: String,
    pub data: TargetsView,
}

/// Erro de comando convertido em resposta JSON `{ "error": ... }`.
pub struct ApiError(MonitorError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::Conflict(_) => StatusCode::CONFLICT,
            MonitorError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            MonitorError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            error!("Erro no store durante comando: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        ApiError(err)
    }
}

async fn snapshot(registry: &Registry) -> Result<TargetsView, ApiError> {
    let targets = registry.list_all().await?;
    Ok(TargetsView::from(targets.as_slice()))
}

async fn list_handler(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<TargetsView>, ApiError> {
    Ok(Json(snapshot(&registry).await?))
}

async fn command_handler(
    State(registry): State<Arc<Registry>>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let url = payload.url.as_str();
    let message = match Action::parse(payload.action.as_deref()) {
        Action::Add => {
            registry.add(url).await?;
            format!("URL {url} added")
        }
        Action::Start => {
            registry.start(url).await?;
            format!("URL {url} started")
        }
        Action::Stop => {
            registry.stop(url).await?;
            format!("URL {url} stopped")
        }
        Action::Delete => {
            if !registry.delete(url).await? {
                return Err(MonitorError::NotFound(url.to_string()).into());
            }
            format!("URL {url} deleted")
        }
        Action::Counter => {
            registry.increment_success_counter(url).await?;
            format!("Counter for URL {url} updated")
        }
        Action::Upsert => {
            registry.ensure_started(url).await?;
            format!("URL {url} added or started")
        }
    };

    Ok(Json(CommandResponse {
        message,
        data: snapshot(&registry).await?,
    }))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/urls", get(list_handler).post(command_handler))
        .with_state(registry)
}

pub async fn run_http_server<F>(
    registry: Arc<Registry>,
    http_addr: SocketAddr,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    info!("API HTTP ouvindo em {}", http_addr);
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
