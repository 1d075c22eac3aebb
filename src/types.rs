use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_postgres::Row;

/// Struct de alvo monitorado (uma linha por URL única)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub url: String,
    pub active: bool,
    /// Pings com sucesso desde o último start.
    pub request_count: i64,
    /// Tentativas (sucesso ou falha) enquanto ativo.
    pub total_requests: i64,
    /// Milissegundos desde epoch; `None` quando parado.
    pub start_time: Option<i64>,
}

impl Target {
    /// Alvo recém-cadastrado: inativo, contadores zerados.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            active: false,
            request_count: 0,
            total_requests: 0,
            start_time: None,
        }
    }
}

impl From<Row> for Target {
    fn from(row: Row) -> Self {
        Self {
            url: row.get("url"),
            active: row.get("active"),
            request_count: row.get("request_count"),
            total_requests: row.get("total_requests"),
            start_time: row.get("start_time"),
        }
    }
}

/// Visão tabular do store: mapas paralelos URL -> campo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsView {
    pub urls: Vec<String>,
    pub active: BTreeMap<String, bool>,
    pub counters: BTreeMap<String, i64>,
    pub total_requests: BTreeMap<String, i64>,
    pub start_times: BTreeMap<String, Option<i64>>,
}

impl From<&[Target]> for TargetsView {
    fn from(targets: &[Target]) -> Self {
        let mut view = TargetsView::default();
        for target in targets {
            view.urls.push(target.url.clone());
            view.active.insert(target.url.clone(), target.active);
            view.counters
                .insert(target.url.clone(), target.request_count);
            view.total_requests
                .insert(target.url.clone(), target.total_requests);
            view.start_times
                .insert(target.url.clone(), target.start_time);
        }
        view
    }
}

/// Resumo de um tick do scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Pingados, mas parados/removidos depois do snapshot: sem contadores.
    pub uncounted: usize,
    /// O store falhou no meio do tick e os alvos restantes não foram pingados.
    pub aborted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_serializes_as_parallel_maps() {
        let mut running = Target::new("https://a.example");
        running.active = true;
        running.request_count = 2;
        running.total_requests = 3;
        running.start_time = Some(1_700_000_000_000);
        let stopped = Target::new("https://b.example");

        let view = TargetsView::from(&[running, stopped][..]);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["urls"], serde_json::json!(["https://a.example", "https://b.example"]));
        assert_eq!(json["active"]["https://a.example"], true);
        assert_eq!(json["counters"]["https://a.example"], 2);
        assert_eq!(json["totalRequests"]["https://a.example"], 3);
        assert_eq!(json["startTimes"]["https://a.example"], 1_700_000_000_000_i64);
        assert!(json["startTimes"]["https://b.example"].is_null());
    }
}
