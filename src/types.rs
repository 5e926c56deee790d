use crate::error::{ReportError, ReportResult};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio_postgres::Row;

/// Status reportado por um poll da loja.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Active => "active",
            StoreStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for StoreStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StoreStatus::Active),
            "inactive" => Ok(StoreStatus::Inactive),
            other => Err(format!("status desconhecido: {other}")),
        }
    }
}

/// Poll de uma loja em UTC. Imutável depois de lido.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    pub store_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: StoreStatus,
}

impl Observation {
    pub fn new(store_id: impl Into<String>, timestamp: DateTime<Utc>, status: StoreStatus) -> Self {
        Self {
            store_id: store_id.into(),
            timestamp,
            status,
        }
    }
}

/// Regra de horário comercial (hora local). `day_of_week`: 0 = segunda.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessHoursRule {
    pub store_id: String,
    pub day_of_week: i32,
    pub open_local: NaiveTime,
    pub close_local: NaiveTime,
}

impl TryFrom<Row> for BusinessHoursRule {
    type Error = ReportError;

    /// Colunas NULL viram erro da loja, não pânico.
    fn try_from(row: Row) -> ReportResult<Self> {
        Ok(Self {
            store_id: row.try_get("store_id")?,
            day_of_week: row.try_get("day_of_week")?,
            open_local: row.try_get("start_time_local")?,
            close_local: row.try_get("end_time_local")?,
        })
    }
}

/// Fuso horário atribuído a uma loja.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimezoneAssignment {
    pub store_id: String,
    pub zone_name: String,
}

impl TimezoneAssignment {
    /// `timezone_str` NULL equivale a loja sem fuso (`None`).
    pub fn from_row(row: &Row) -> ReportResult<Option<Self>> {
        let store_id: String = row.try_get("store_id")?;
        let zone_name: Option<String> = row.try_get("timezone_str")?;
        Ok(zone_name.map(|zone_name| Self {
            store_id,
            zone_name,
        }))
    }
}

/// Tudo que o cálculo precisa de uma loja, lido num único snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub store_id: String,
    /// Ordenadas por timestamp; empates mantêm a ordem da fonte.
    pub observations: Vec<Observation>,
    pub rules: Vec<BusinessHoursRule>,
    pub timezone: Option<TimezoneAssignment>,
}

impl StoreSnapshot {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            ..Default::default()
        }
    }

    /// Instante de referência: o poll mais recente da loja.
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).max()
    }
}

/// Janelas retroativas do relatório.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportWindow {
    LastHour,
    LastDay,
    LastWeek,
}

impl ReportWindow {
    pub const ALL: [ReportWindow; 3] = [
        ReportWindow::LastHour,
        ReportWindow::LastDay,
        ReportWindow::LastWeek,
    ];

    pub fn span(self) -> Duration {
        match self {
            ReportWindow::LastHour => Duration::hours(1),
            ReportWindow::LastDay => Duration::days(1),
            ReportWindow::LastWeek => Duration::days(7),
        }
    }

    /// Segundos por unidade de saída: minutos na janela de uma hora, horas nas demais.
    pub fn unit_seconds(self) -> f64 {
        match self {
            ReportWindow::LastHour => 60.0,
            ReportWindow::LastDay | ReportWindow::LastWeek => 3600.0,
        }
    }
}

/// Linha do relatório de uma loja.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRow {
    pub store_id: String,
    pub uptime_last_hour_min: i64,
    pub uptime_last_day_hr: i64,
    pub uptime_last_week_hr: i64,
    pub downtime_last_hour_min: i64,
    pub downtime_last_day_hr: i64,
    pub downtime_last_week_hr: i64,
}

/// Status do job de relatório (coluna VARCHAR `reports.status`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "Running",
            JobStatus::Complete => "Complete",
            JobStatus::Error => "Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Running" => Ok(JobStatus::Running),
            "Complete" => Ok(JobStatus::Complete),
            "Error" => Ok(JobStatus::Error),
            other => Err(ReportError::Storage(format!(
                "status de job inesperado: {other}"
            ))),
        }
    }
}

/// Lojas cobertas por um job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobScope {
    AllStores,
    Store(String),
}

impl JobScope {
    /// Valor da coluna `reports.store_id` (NULL para relatórios de todas as lojas).
    pub fn store_id(&self) -> Option<&str> {
        match self {
            JobScope::AllStores => None,
            JobScope::Store(id) => Some(id),
        }
    }
}

/// Registro de status de um job de relatório.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub job_id: String,
    pub scope: JobScope,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub artifact_path: Option<PathBuf>,
    /// Observação não fatal (falhas parciais, erro ao gravar o artefato).
    pub detail: Option<String>,
}

impl TryFrom<Row> for Job {
    type Error = ReportError;

    fn try_from(row: Row) -> ReportResult<Self> {
        let status: String = row.try_get("status")?;
        let store_id: Option<String> = row.try_get("store_id")?;
        let report_path: Option<String> = row.try_get("report_path")?;
        Ok(Self {
            job_id: row.try_get("report_id")?,
            scope: store_id.map_or(JobScope::AllStores, JobScope::Store),
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
            artifact_path: report_path.map(PathBuf::from),
            detail: row.try_get("detail")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(" Active ".parse::<StoreStatus>(), Ok(StoreStatus::Active));
        assert_eq!("inactive".parse::<StoreStatus>(), Ok(StoreStatus::Inactive));
        assert!("maybe".parse::<StoreStatus>().is_err());
    }

    #[test]
    fn reference_instant_is_latest_poll() {
        let mut snapshot = StoreSnapshot::new("loja-1");
        let t0 = DateTime::parse_from_rfc3339("2023-01-22T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        snapshot.observations = vec![
            Observation::new("loja-1", t0, StoreStatus::Active),
            Observation::new("loja-1", t0 + Duration::minutes(5), StoreStatus::Inactive),
        ];
        assert_eq!(snapshot.reference_instant(), Some(t0 + Duration::minutes(5)));
        assert_eq!(StoreSnapshot::new("vazia").reference_instant(), None);
    }

    #[test]
    fn job_status_round_trips_through_column_text() {
        for status in [JobStatus::Running, JobStatus::Complete, JobStatus::Error] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("Pending".parse::<JobStatus>().is_err());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }
}
