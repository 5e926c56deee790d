//! service.rs — Disparo, acompanhamento e download dos relatórios.
//!
//! Cada job vira uma task tokio limitada por um semáforo (pool de workers).
//! O status dos jobs só é acessado pela interface `JobStore`.

use crate::artifact::{self, ArtifactRead};
use crate::config::Config;
use crate::error::{ReportError, ReportResult};
use crate::jobs::{JobOutcome, JobStore};
use crate::report;
use crate::storage::StoreSource;
use crate::types::{Job, JobScope, JobStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Grava o status terminal `Error`; se nem isso for possível, só resta o log.
async fn finish_with_error(jobs: &dyn JobStore, job_id: &str, detail: &str) {
    if let Err(e) = jobs.finish(job_id, JobOutcome::error(detail)).await {
        warn!("[JOB {}] Erro ao registrar status final: {:?}", job_id, e);
    }
}

/// Resposta do polling de um job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPoll {
    Running,
    Complete { artifact: Option<PathBuf> },
    Error { detail: Option<String> },
}

impl From<&Job> for JobPoll {
    fn from(job: &Job) -> Self {
        match job.status {
            JobStatus::Running => JobPoll::Running,
            JobStatus::Complete => JobPoll::Complete {
                artifact: job.artifact_path.clone(),
            },
            JobStatus::Error => JobPoll::Error {
                detail: job.detail.clone(),
            },
        }
    }
}

/// Resposta do download de um relatório.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactFetch {
    Running,
    Error,
    Ready { file_name: String, bytes: Vec<u8> },
    /// Job completo, mas o arquivo não pode ser entregue.
    Unavailable { reason: String },
}

pub struct ReportService {
    config: Arc<Config>,
    source: Arc<dyn StoreSource>,
    jobs: Arc<dyn JobStore>,
    workers: Arc<Semaphore>,
}

impl ReportService {
    pub fn new(config: Config, source: Arc<dyn StoreSource>, jobs: Arc<dyn JobStore>) -> Self {
        let workers = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            source,
            jobs,
            workers,
        }
    }

    /// Registra um job `Running` e agenda a execução. Devolve o id do job.
    pub async fn trigger(&self, scope: JobScope) -> ReportResult<String> {
        let store_ids = match &scope {
            JobScope::Store(store_id) => {
                if !self.source.store_exists(store_id).await? {
                    return Err(ReportError::not_found(format!("loja {store_id}")));
                }
                vec![store_id.clone()]
            }
            JobScope::AllStores => {
                let ids = self.source.list_store_ids().await?;
                if ids.is_empty() {
                    return Err(ReportError::not_found("nenhuma loja em store_status"));
                }
                ids
            }
        };

        let job = self.jobs.create(&scope).await?;
        let job_id = job.job_id.clone();
        info!(
            "[JOB {}] Job criado para {} loja(s).",
            job_id,
            store_ids.len()
        );

        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);
        let jobs = Arc::clone(&self.jobs);
        let workers = Arc::clone(&self.workers);
        tokio::spawn(async move {
            let job_id = job.job_id;
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("[JOB {}] Pool de workers fechado: {:?}", job_id, e);
                    finish_with_error(jobs.as_ref(), &job_id, "pool de workers fechado").await;
                    return;
                }
            };

            // Task interna: um pânico no cálculo não pode deixar o job em `Running`.
            let run = tokio::spawn(report::run_job(
                config,
                source,
                Arc::clone(&jobs),
                job_id.clone(),
                store_ids,
            ));
            if let Err(e) = run.await {
                error!("[JOB {}] Execução interrompida: {:?}", job_id, e);
                finish_with_error(
                    jobs.as_ref(),
                    &job_id,
                    &format!("execução do job interrompida: {e}"),
                )
                .await;
            }
        });

        Ok(job_id)
    }

    pub async fn job(&self, job_id: &str) -> ReportResult<Job> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| ReportError::not_found(format!("job {job_id}")))
    }

    pub async fn poll(&self, job_id: &str) -> ReportResult<JobPoll> {
        Ok(JobPoll::from(&self.job(job_id).await?))
    }

    /// Espera o job sair de `Running`, consultando a cada `interval`.
    pub async fn wait_for(&self, job_id: &str, interval: Duration) -> ReportResult<JobPoll> {
        loop {
            match self.poll(job_id).await? {
                JobPoll::Running => tokio::time::sleep(interval).await,
                terminal => return Ok(terminal),
            }
        }
    }

    /// Bytes do CSV de um job completo, se o arquivo estiver dentro de `reports_dir`.
    pub async fn fetch_artifact(&self, job_id: &str) -> ReportResult<ArtifactFetch> {
        let job = self.job(job_id).await?;
        let fetch = match job.status {
            JobStatus::Running => ArtifactFetch::Running,
            JobStatus::Error => ArtifactFetch::Error,
            JobStatus::Complete => {
                match artifact::read_report(&self.config.reports_dir, job.artifact_path.as_deref())
                    .await
                {
                    ArtifactRead::Ready { file_name, bytes } => {
                        ArtifactFetch::Ready { file_name, bytes }
                    }
                    ArtifactRead::Unavailable { reason } => ArtifactFetch::Unavailable { reason },
                }
            }
        };
        Ok(fetch)
    }
}
