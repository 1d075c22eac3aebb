use config as config_crate;
use serde::Deserialize;
use std::time::Duration;

/// Configuração operacional do sistema.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Intervalo entre ticks do scheduler, em minutos.
    #[serde(default = "default_tick_interval_minutes")]
    pub tick_interval_minutes: u64,
    /// Timeout em segundos para cada requisição HTTP.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Espera entre pings consecutivos dentro de um tick.
    #[serde(default = "default_delay_ms")]
    pub pacing_delay_ms: u64,
    /// Espera aplicada por stop/delete antes de retornar.
    #[serde(default = "default_delay_ms")]
    pub settle_delay_ms: u64,
    /// URL de conexão com o banco PostgreSQL (ou `memory://`).
    pub database_url: String,
    /// Endereço de escuta da API HTTP.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Uma semana.
pub const MAX_TICK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

fn default_tick_interval_minutes() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Config {
    /// Lê `config.{toml,yaml,json}` (opcional) e sobrepõe variáveis `KEEPALIVE_*`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config_crate::Config::builder()
            .add_source(config_crate::File::with_name("config").required(false))
            .add_source(config_crate::Environment::with_prefix("KEEPALIVE").try_parsing(true))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_minutes == 0 {
            return Err("tick_interval_minutes deve ser maior que zero".into());
        }
        if self.tick_interval_minutes > MAX_TICK_INTERVAL_MINUTES {
            return Err(format!(
                "tick_interval_minutes não pode passar de {MAX_TICK_INTERVAL_MINUTES}"
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs deve ser maior que zero".into());
        }
        if self.pacing_delay_ms == 0 {
            return Err("pacing_delay_ms deve ser maior que zero".into());
        }
        if self.settle_delay_ms == 0 {
            return Err("settle_delay_ms deve ser maior que zero".into());
        }
        if self.database_url.trim().is_empty() {
            return Err("database_url não pode ser vazio".into());
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(
            self.tick_interval_minutes
                .min(MAX_TICK_INTERVAL_MINUTES)
                .saturating_mul(60),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
