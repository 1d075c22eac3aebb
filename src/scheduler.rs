// src/scheduler.rs

use crate::ping::PingExecutor;
use crate::registry::Registry;
use crate::types::TickReport;
use std::{sync::Arc, time::Duration, time::Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{error, info};

/// Scheduler periódico: a cada tick tira um snapshot dos alvos ativos e
/// entrega ao executor.
pub struct Scheduler {
    registry: Arc<Registry>,
    executor: PingExecutor,
    tick_interval: Duration,
}

/// Handle da task do scheduler, para encerramento explícito.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(registry: Arc<Registry>, executor: PingExecutor, tick_interval: Duration) -> Self {
        Self {
            registry,
            executor,
            tick_interval,
        }
    }

    /// Executa um único tick. Erro no snapshot aborta só este tick.
    pub async fn run_tick(&self, cycle_number: u64) -> Option<TickReport> {
        let cycle_start = Instant::now();
        info!("[CICLO {}] Iniciando tick.", cycle_number);

        let targets = match self.registry.list_active().await {
            Ok(targets) => targets,
            Err(e) => {
                error!(
                    "[CICLO {}] Erro ao ler alvos ativos, tick ignorado: {:?}",
                    cycle_number, e
                );
                return None;
            }
        };

        info!(
            "[CICLO {}] Executando pings para {} alvos...",
            cycle_number,
            targets.len()
        );
        let report = self.executor.run(&self.registry, &targets).await;

        info!(
            "[CICLO {}] Fim do tick. Tentativas: {}, sucessos: {}, falhas: {}, sem contagem: {}, abortado: {}. Duração: {:?}",
            cycle_number,
            report.attempted,
            report.succeeded,
            report.failed,
            report.uncounted,
            report.aborted,
            cycle_start.elapsed()
        );
        Some(report)
    }

    /// Inicia o loop em background. O primeiro tick ocorre após um intervalo.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(
                tokio::time::Instant::now() + self.tick_interval,
                self.tick_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycle_number: u64 = 0;

            info!(
                "Scheduler iniciado, intervalo entre ticks: {:?}.",
                self.tick_interval
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cycle_number += 1;
                        self.run_tick(cycle_number).await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Scheduler encerrado.");
                        break;
                    }
                }
            }
        });
        SchedulerHandle { shutdown, task }
    }
}

impl SchedulerHandle {
    /// Sinaliza o encerramento e espera o tick em andamento terminar.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Scheduler terminou com erro: {:?}", e);
        }
    }
}
