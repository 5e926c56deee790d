use crate::error::{ReportError, ReportResult};
use crate::storage::Storage;
use crate::types::{Job, JobScope, JobStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Escrita terminal de um job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub artifact_path: Option<PathBuf>,
    pub detail: Option<String>,
}

impl JobOutcome {
    pub fn complete(artifact_path: PathBuf, detail: Option<String>) -> Self {
        Self {
            status: JobStatus::Complete,
            artifact_path: Some(artifact_path),
            detail,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            artifact_path: None,
            detail: Some(detail.into()),
        }
    }
}

/// Acesso sincronizado aos registros de status dos jobs.
///
/// Cada job recebe exatamente uma escrita terminal; `finish` recusa a segunda.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, scope: &JobScope) -> ReportResult<Job>;

    async fn get(&self, job_id: &str) -> ReportResult<Option<Job>>;

    async fn finish(&self, job_id: &str, outcome: JobOutcome) -> ReportResult<()>;
}

pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn running_job(scope: &JobScope) -> Job {
    Job {
        job_id: new_job_id(),
        scope: scope.clone(),
        status: JobStatus::Running,
        created_at: Utc::now(),
        completed_at: None,
        artifact_path: None,
        detail: None,
    }
}

/// Registro de jobs em memória.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ReportResult<std::sync::MutexGuard<'_, HashMap<String, Job>>> {
        self.jobs
            .lock()
            .map_err(|_| ReportError::storage("registro de jobs envenenado"))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, scope: &JobScope) -> ReportResult<Job> {
        let job = running_job(scope);
        self.lock()?.insert(job.job_id.clone(), job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> ReportResult<Option<Job>> {
        Ok(self.lock()?.get(job_id).cloned())
    }

    async fn finish(&self, job_id: &str, outcome: JobOutcome) -> ReportResult<()> {
        let mut jobs = self.lock()?;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| ReportError::not_found(format!("job {job_id}")))?;
        if job.status.is_terminal() {
            return Err(ReportError::JobAlreadyFinished(job_id.to_string()));
        }
        job.status = outcome.status;
        job.completed_at = Some(Utc::now());
        job.artifact_path = outcome.artifact_path;
        job.detail = outcome.detail;
        Ok(())
    }
}

/// Tabela `reports` no PostgreSQL.
#[async_trait]
impl JobStore for Storage {
    async fn create(&self, scope: &JobScope) -> ReportResult<Job> {
        let job = running_job(scope);
        let client = self.pool().get().await?;
        client
            .execute(
                r#"
                INSERT INTO reports (report_id, store_id, status, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
                &[
                    &job.job_id,
                    &job.scope.store_id(),
                    &job.status.as_str(),
                    &job.created_at,
                ],
            )
            .await?;
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> ReportResult<Option<Job>> {
        let client = self.pool().get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT report_id, status, created_at, completed_at, report_path, store_id, detail
                FROM reports
                WHERE report_id = $1
                "#,
                &[&job_id],
            )
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn finish(&self, job_id: &str, outcome: JobOutcome) -> ReportResult<()> {
        let client = self.pool().get().await?;
        let report_path = outcome
            .artifact_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let updated = client
            .execute(
                r#"
                UPDATE reports
                SET status = $2, completed_at = $3, report_path = $4, detail = $5
                WHERE report_id = $1 AND status = 'Running'
                "#,
                &[
                    &job_id,
                    &outcome.status.as_str(),
                    &Utc::now(),
                    &report_path,
                    &outcome.detail,
                ],
            )
            .await?;
        if updated == 1 {
            return Ok(());
        }
        match self.get(job_id).await? {
            Some(_) => Err(ReportError::JobAlreadyFinished(job_id.to_string())),
            None => Err(ReportError::not_found(format!("job {job_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_is_created_running_and_finished_once() {
        let store = MemoryJobStore::new();
        let job = store
            .create(&JobScope::Store("loja-1".into()))
            .await
            .expect("create");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.job_id.len(), 32);

        store
            .finish(&job.job_id, JobOutcome::complete(PathBuf::from("r.csv"), None))
            .await
            .expect("finish");
        let finished = store.get(&job.job_id).await.expect("get").expect("job");
        assert_eq!(finished.status, JobStatus::Complete);
        assert!(finished.completed_at.is_some());

        let second = store
            .finish(&job.job_id, JobOutcome::error("tarde demais"))
            .await;
        assert!(matches!(second, Err(ReportError::JobAlreadyFinished(_))));
        let unchanged = store.get(&job.job_id).await.expect("get").expect("job");
        assert_eq!(unchanged.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn finishing_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        assert!(matches!(
            store.finish("nada", JobOutcome::error("x")).await,
            Err(ReportError::NotFound(_))
        ));
        assert!(store.get("nada").await.expect("get").is_none());
    }
}
