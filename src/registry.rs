//! registry.rs — API de comandos sobre o store de alvos
//!
//! `stop` e `delete` bloqueiam o chamador pelo settle delay para reduzir a
//! corrida com um tick que ainda esteja incrementando contadores da URL.

use crate::error::{MonitorError, Result};
use crate::storage::TargetStore;
use crate::types::Target;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Registry {
    store: Arc<dyn TargetStore>,
    settle_delay: Duration,
}

impl Registry {
    pub fn new(store: Arc<dyn TargetStore>, settle_delay: Duration) -> Self {
        Self {
            store,
            settle_delay,
        }
    }

    /// Cadastra a URL como inativa. No-op se já existir.
    pub async fn add(&self, url: &str) -> Result<()> {
        validate_url(url)?;
        if self.store.insert_if_absent(url).await? {
            info!(url, "URL cadastrada.");
        } else {
            debug!(url, "URL já cadastrada, nada a fazer.");
        }
        Ok(())
    }

    /// Ativa a URL (criando se necessário). Zera apenas `request_count`.
    pub async fn start(&self, url: &str) -> Result<Target> {
        validate_url(url)?;
        let target = self.store.activate(url, now_millis()).await?;
        info!(url, start_time = ?target.start_time, "Monitoramento iniciado.");
        Ok(target)
    }

    /// Caminho padrão do comando: cadastra se ausente e ativa se parado.
    /// Alvos já ativos permanecem intactos.
    pub async fn ensure_started(&self, url: &str) -> Result<Target> {
        validate_url(url)?;
        let target = self.store.ensure_active(url, now_millis()).await?;
        info!(url, "URL cadastrada ou iniciada.");
        Ok(target)
    }

    /// Para o monitoramento e zera os contadores, depois aguarda o settle delay.
    pub async fn stop(&self, url: &str) -> Result<Target> {
        let target = self
            .store
            .deactivate(url)
            .await?
            .ok_or_else(|| MonitorError::NotFound(url.to_string()))?;
        info!(url, "Monitoramento parado.");
        tokio::time::sleep(self.settle_delay).await;
        Ok(target)
    }

    /// Remove a URL. Alvos ativos são parados antes, com um settle delay extra.
    /// Retorna `false` se a URL não existia.
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let Some(target) = self.store.get_target(url).await? else {
            debug!(url, "URL inexistente, nada a remover.");
            return Ok(false);
        };

        if target.active {
            match self.stop(url).await {
                Ok(_) | Err(MonitorError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.settle_delay).await;
        }

        let deleted = self.store.delete_target(url).await?;
        if deleted {
            info!(url, "URL removida.");
        }
        Ok(deleted)
    }

    /// `request_count += 1`. Não altera `total_requests`.
    pub async fn increment_success_counter(&self, url: &str) -> Result<()> {
        if self.store.increment_request_count(url).await? {
            return Ok(());
        }
        match self.store.get_target(url).await? {
            Some(_) => Err(MonitorError::Conflict(url.to_string())),
            None => Err(MonitorError::NotFound(url.to_string())),
        }
    }

    /// Conta uma tentativa de ping. Erra se o alvo sumiu ou foi parado.
    pub async fn record_attempt(&self, url: &str) -> Result<()> {
        if self.store.increment_total_requests(url).await? {
            return Ok(());
        }
        match self.store.get_target(url).await? {
            Some(_) => Err(MonitorError::Conflict(url.to_string())),
            None => Err(MonitorError::NotFound(url.to_string())),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Target>> {
        self.store.list_targets().await
    }

    /// Snapshot dos alvos ativos para um tick.
    pub async fn list_active(&self) -> Result<Vec<Target>> {
        self.store.list_active().await
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Aceita apenas URLs absolutas http/https.
pub fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(MonitorError::InvalidUrl("URL vazia".into()));
    }
    let parsed = Url::parse(url).map_err(|e| MonitorError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(MonitorError::InvalidUrl(format!(
            "{url}: esquema {other} não suportado"
        ))),
    }
}
