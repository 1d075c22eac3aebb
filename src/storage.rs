//! storage.rs — Persistência dos alvos monitorados
//!
//! Toda alteração de contador é um único statement atômico (`x = x + 1`),
//! condicionado a `active`, para que um tick em andamento não escreva sobre
//! um alvo que acabou de ser parado.

use crate::error::Result;
use crate::types::Target;
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio::sync::RwLock;
use tokio_postgres::NoTls;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
    id BIGSERIAL PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    active BOOLEAN NOT NULL DEFAULT FALSE,
    request_count BIGINT NOT NULL DEFAULT 0,
    total_requests BIGINT NOT NULL DEFAULT 0,
    start_time BIGINT
)
"#;

const COLUMNS: &str = "url, active, request_count, total_requests, start_time";

/// Tabela durável de alvos, indexada por URL.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Cria o schema se ainda não existir. Seguro em todo startup.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insere um alvo inativo. Retorna `false` se a URL já existia.
    async fn insert_if_absent(&self, url: &str) -> Result<bool>;

    /// Todos os alvos, em ordem de cadastro.
    async fn list_targets(&self) -> Result<Vec<Target>>;

    async fn list_active(&self) -> Result<Vec<Target>>;

    async fn get_target(&self, url: &str) -> Result<Option<Target>>;

    /// Upsert: cria se ausente e ativa com `request_count = 0`.
    /// `total_requests` é preservado.
    async fn activate(&self, url: &str, start_time: i64) -> Result<Target>;

    /// Como `activate`, mas não toca em alvos que já estão ativos.
    async fn ensure_active(&self, url: &str, start_time: i64) -> Result<Target>;

    /// Desativa e zera contadores. `None` se a URL não existe.
    async fn deactivate(&self, url: &str) -> Result<Option<Target>>;

    /// `total_requests += 1` se o alvo existe e está ativo.
    async fn increment_total_requests(&self, url: &str) -> Result<bool>;

    /// `request_count += 1` se o alvo existe, está ativo e
    /// `total_requests > request_count`.
    async fn increment_request_count(&self, url: &str) -> Result<bool>;

    async fn delete_target(&self, url: &str) -> Result<bool>;
}

/// Store PostgreSQL com pool de conexões.
pub struct Storage {
    pool: Pool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pg_config: tokio_postgres::Config = database_url.parse()?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager).max_size(10).build()?;
        // Falha cedo se o banco não responde.
        let _client = pool.get().await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TargetStore for Storage {
    async fn ensure_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Schema da tabela urls verificado.");
        Ok(())
    }

    async fn insert_if_absent(&self, url: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                "INSERT INTO urls (url) VALUES ($1) ON CONFLICT (url) DO NOTHING",
                &[&url],
            )
            .await?;
        Ok(inserted == 1)
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(format!("SELECT {COLUMNS} FROM urls ORDER BY id").as_str(), &[])
            .await?;
        Ok(rows.into_iter().map(Target::from).collect())
    }

    async fn list_active(&self) -> Result<Vec<Target>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                format!("SELECT {COLUMNS} FROM urls WHERE active ORDER BY id").as_str(),
                &[],
            )
            .await?;
        Ok(rows.into_iter().map(Target::from).collect())
    }

    async fn get_target(&self, url: &str) -> Result<Option<Target>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!("SELECT {COLUMNS} FROM urls WHERE url = $1").as_str(),
                &[&url],
            )
            .await?;
        Ok(row.map(Target::from))
    }

    async fn activate(&self, url: &str, start_time: i64) -> Result<Target> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                format!(
                    r#"
                    INSERT INTO urls (url, active, request_count, start_time)
                    VALUES ($1, TRUE, 0, $2)
                    ON CONFLICT (url) DO UPDATE
                    SET active = TRUE, request_count = 0, start_time = EXCLUDED.start_time
                    RETURNING {COLUMNS}
                    "#
                )
                .as_str(),
                &[&url, &start_time],
            )
            .await?;
        Ok(Target::from(row))
    }

    async fn ensure_active(&self, url: &str, start_time: i64) -> Result<Target> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                format!(
                    r#"
                    INSERT INTO urls (url, active, request_count, start_time)
                    VALUES ($1, TRUE, 0, $2)
                    ON CONFLICT (url) DO UPDATE
                    SET active = TRUE,
                        request_count = CASE WHEN urls.active THEN urls.request_count ELSE 0 END,
                        start_time = CASE WHEN urls.active THEN urls.start_time ELSE EXCLUDED.start_time END
                    RETURNING {COLUMNS}
                    "#
                )
                .as_str(),
                &[&url, &start_time],
            )
            .await?;
        Ok(Target::from(row))
    }

    async fn deactivate(&self, url: &str) -> Result<Option<Target>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!(
                    r#"
                    UPDATE urls
                    SET active = FALSE, request_count = 0, total_requests = 0, start_time = NULL
                    WHERE url = $1
                    RETURNING {COLUMNS}
                    "#
                )
                .as_str(),
                &[&url],
            )
            .await?;
        Ok(row.map(Target::from))
    }

    async fn increment_total_requests(&self, url: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE urls SET total_requests = total_requests + 1 WHERE url = $1 AND active",
                &[&url],
            )
            .await?;
        Ok(updated == 1)
    }

    async fn increment_request_count(&self, url: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE urls SET request_count = request_count + 1
                WHERE url = $1 AND active AND total_requests > request_count
                "#,
                &[&url],
            )
            .await?;
        Ok(updated == 1)
    }

    async fn delete_target(&self, url: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM urls WHERE url = $1", &[&url])
            .await?;
        Ok(deleted == 1)
    }
}

/// Store em memória, não durável. Usado em testes e com `memory://`.
#[derive(Default)]
pub struct MemoryStorage {
    rows: RwLock<Vec<Target>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TargetStore for MemoryStorage {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_if_absent(&self, url: &str) -> Result<bool> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|t| t.url == url) {
            return Ok(false);
        }
        rows.push(Target::new(url));
        Ok(true)
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(self.rows.read().await.clone())
    }

    async fn list_active(&self) -> Result<Vec<Target>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|t| t.active).cloned().collect())
    }

    async fn get_target(&self, url: &str) -> Result<Option<Target>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|t| t.url == url).cloned())
    }

    async fn activate(&self, url: &str, start_time: i64) -> Result<Target> {
        let mut rows = self.rows.write().await;
        let idx = match rows.iter().position(|t| t.url == url) {
            Some(idx) => idx,
            None => {
                rows.push(Target::new(url));
                rows.len() - 1
            }
        };
        let target = &mut rows[idx];
        target.active = true;
        target.request_count = 0;
        target.start_time = Some(start_time);
        Ok(target.clone())
    }

    async fn ensure_active(&self, url: &str, start_time: i64) -> Result<Target> {
        let mut rows = self.rows.write().await;
        let idx = match rows.iter().position(|t| t.url == url) {
            Some(idx) => idx,
            None => {
                rows.push(Target::new(url));
                rows.len() - 1
            }
        };
        let target = &mut rows[idx];
        if !target.active {
            target.active = true;
            target.request_count = 0;
            target.start_time = Some(start_time);
        }
        Ok(target.clone())
    }

    async fn deactivate(&self, url: &str) -> Result<Option<Target>> {
        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|t| t.url == url).map(|target| {
            target.active = false;
            target.request_count = 0;
            target.total_requests = 0;
            target.start_time = None;
            target.clone()
        }))
    }

    async fn increment_total_requests(&self, url: &str) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|t| t.url == url && t.active) {
            Some(target) => {
                target.total_requests += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_request_count(&self, url: &str) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|t| t.url == url && t.active && t.total_requests > t.request_count)
        {
            Some(target) => {
                target.request_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_target(&self, url: &str) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|t| t.url != url);
        Ok(rows.len() < before)
    }
}
