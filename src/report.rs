// src/report.rs

use crate::aggregate::compute_row;
use crate::artifact;
use crate::config::Config;
use crate::jobs::{JobOutcome, JobStore};
use crate::storage::StoreSource;
use crate::types::ReportRow;
use chrono::Duration;
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

/// Resultado do processamento de uma loja dentro de um job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Row(ReportRow),
    /// Loja desconhecida ou sem polls.
    Skipped,
    Failed(String),
}

/// Linhas e falhas acumuladas de um job.
#[derive(Debug, Default)]
pub struct ReportRun {
    pub rows: Vec<ReportRow>,
    pub failed: Vec<(String, String)>,
    pub skipped: usize,
}

impl ReportRun {
    pub fn record(&mut self, store_id: &str, outcome: StoreOutcome) {
        match outcome {
            StoreOutcome::Row(row) => self.rows.push(row),
            StoreOutcome::Skipped => self.skipped += 1,
            StoreOutcome::Failed(reason) => self.failed.push((store_id.to_string(), reason)),
        }
    }

    /// Todas as lojas tentadas falharam (e houve ao menos uma tentativa).
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.rows.is_empty()
    }

    pub fn failure_detail(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let stores: Vec<&str> = self.failed.iter().map(|(id, _)| id.as_str()).collect();
        Some(format!(
            "{} loja(s) com falha: {}",
            self.failed.len(),
            stores.join(", ")
        ))
    }
}

/// Janela de leitura necessária para a última semana, com folga da margem.
pub fn lookback(config: &Config) -> Duration {
    Duration::days(7) + config.look_around()
}

/// Processa uma loja. Erros ficam isolados na própria loja.
pub async fn process_store(
    source: &dyn StoreSource,
    config: &Config,
    job_id: &str,
    store_id: &str,
) -> StoreOutcome {
    match source.load_snapshot(store_id, lookback(config)).await {
        Ok(None) => {
            info!(
                "[JOB {}][LOJA {}] Loja não encontrada em store_status. Ignorando.",
                job_id, store_id
            );
            StoreOutcome::Skipped
        }
        Ok(Some(snapshot)) => match compute_row(&snapshot, config) {
            Some(row) => {
                debug!("[JOB {}][LOJA {}] Linha calculada: {:?}", job_id, store_id, row);
                StoreOutcome::Row(row)
            }
            None => {
                info!(
                    "[JOB {}][LOJA {}] Loja sem polls. Ignorando.",
                    job_id, store_id
                );
                StoreOutcome::Skipped
            }
        },
        Err(e) => {
            error!(
                "[JOB {}][LOJA {}] Erro ao processar loja: {:?}",
                job_id, store_id, e
            );
            StoreOutcome::Failed(e.to_string())
        }
    }
}

/// Executa um job do início ao fim: lojas em sequência, CSV, status terminal.
pub async fn run_job(
    config: Arc<Config>,
    source: Arc<dyn StoreSource>,
    jobs: Arc<dyn JobStore>,
    job_id: String,
    store_ids: Vec<String>,
) {
    let started = Instant::now();
    info!(
        "[JOB {}] Iniciando relatório para {} loja(s).",
        job_id,
        store_ids.len()
    );

    let mut run = ReportRun::default();
    for store_id in &store_ids {
        let outcome = process_store(source.as_ref(), &config, &job_id, store_id).await;
        run.record(store_id, outcome);
    }

    let outcome = if run.all_failed() {
        JobOutcome::error(run.failure_detail().unwrap_or_default())
    } else {
        match artifact::write_report(&config.reports_dir, &job_id, &run.rows).await {
            Ok(path) => JobOutcome::complete(path, run.failure_detail()),
            Err(e) => {
                error!("[JOB {}] Erro ao gravar CSV: {:?}", job_id, e);
                JobOutcome::error(format!("falha ao gravar o relatório: {e}"))
            }
        }
    };

    info!(
        "[JOB {}] Fim do job: status={}, linhas={}, ignoradas={}, falhas={}. Duração: {:?}",
        job_id,
        outcome.status,
        run.rows.len(),
        run.skipped,
        run.failed.len(),
        started.elapsed()
    );
    if let Err(e) = jobs.finish(&job_id, outcome).await {
        warn!("[JOB {}] Erro ao registrar status final: {:?}", job_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> ReportRow {
        ReportRow {
            store_id: id.into(),
            uptime_last_hour_min: 0,
            uptime_last_day_hr: 0,
            uptime_last_week_hr: 0,
            downtime_last_hour_min: 0,
            downtime_last_day_hr: 0,
            downtime_last_week_hr: 0,
        }
    }

    #[test]
    fn job_fails_only_when_every_attempt_failed() {
        let mut run = ReportRun::default();
        run.record("a", StoreOutcome::Failed("boom".into()));
        run.record("b", StoreOutcome::Skipped);
        assert!(run.all_failed());

        run.record("c", StoreOutcome::Row(row("c")));
        assert!(!run.all_failed());
        assert_eq!(run.failure_detail().as_deref(), Some("1 loja(s) com falha: a"));
    }

    #[test]
    fn nothing_attempted_is_not_a_failure() {
        let mut run = ReportRun::default();
        run.record("a", StoreOutcome::Skipped);
        assert!(!run.all_failed());
        assert_eq!(run.failure_detail(), None);
    }
}
