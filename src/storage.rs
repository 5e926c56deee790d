use crate::error::{ReportError, ReportResult};
use crate::types::{BusinessHoursRule, Observation, StoreSnapshot, StoreStatus, TimezoneAssignment};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::collections::{BTreeMap, BTreeSet};
use tokio_postgres::{IsolationLevel, NoTls, Row};
use tracing::warn;

/// Fonte dos dados de entrada do relatório.
#[async_trait]
pub trait StoreSource: Send + Sync {
    async fn list_store_ids(&self) -> ReportResult<Vec<String>>;

    async fn store_exists(&self, store_id: &str) -> ReportResult<bool>;

    /// Snapshot consistente da loja. `lookback` é medido a partir do poll mais
    /// recente; o último poll anterior ao corte também é devolvido para semear o status.
    /// `None` se a loja não tem polls.
    async fn load_snapshot(
        &self,
        store_id: &str,
        lookback: Duration,
    ) -> ReportResult<Option<StoreSnapshot>>;
}

pub struct Storage {
    pool: Pool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> ReportResult<Self> {
        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| ReportError::InvalidConfig(e.to_string()))?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(10)
            .build()
            .map_err(|e| ReportError::storage(e.to_string()))?;
        // Falha cedo se o banco não estiver acessível.
        let _client = pool.get().await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn observation_from_row(store_id: &str, row: &Row) -> ReportResult<Option<Observation>> {
    let timestamp: DateTime<Utc> = row.try_get("timestamp_utc")?;
    let status: String = row.try_get("status")?;
    match status.parse::<StoreStatus>() {
        Ok(status) => Ok(Some(Observation::new(store_id, timestamp, status))),
        Err(e) => {
            warn!("[LOJA {}] Poll de {} rejeitado: {}", store_id, timestamp, e);
            Ok(None)
        }
    }
}

#[async_trait]
impl StoreSource for Storage {
    async fn list_store_ids(&self) -> ReportResult<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT DISTINCT store_id FROM store_status ORDER BY store_id",
                &[],
            )
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            // polls sem store_id não pertencem a nenhuma loja
            if let Some(id) = row.try_get::<_, Option<String>>("store_id")? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn store_exists(&self, store_id: &str) -> ReportResult<bool> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM store_status WHERE store_id = $1 LIMIT 1",
                &[&store_id],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn load_snapshot(
        &self,
        store_id: &str,
        lookback: Duration,
    ) -> ReportResult<Option<StoreSnapshot>> {
        let mut client = self.pool.get().await?;
        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await?;

        let reference: Option<DateTime<Utc>> = tx
            .query_one(
                "SELECT MAX(timestamp_utc::timestamptz) FROM store_status WHERE store_id = $1",
                &[&store_id],
            )
            .await?
            .try_get(0)?;
        let Some(reference) = reference else {
            tx.commit().await?;
            return Ok(None);
        };
        let cutoff = reference - lookback;

        let seed = tx
            .query_opt(
                r#"
                SELECT timestamp_utc::timestamptz AS timestamp_utc, status
                FROM store_status
                WHERE store_id = $1 AND timestamp_utc::timestamptz < $2
                ORDER BY timestamp_utc::timestamptz DESC, id DESC
                LIMIT 1
                "#,
                &[&store_id, &cutoff],
            )
            .await?;
        let recent = tx
            .query(
                r#"
                SELECT timestamp_utc::timestamptz AS timestamp_utc, status
                FROM store_status
                WHERE store_id = $1 AND timestamp_utc::timestamptz >= $2
                ORDER BY timestamp_utc::timestamptz, id
                "#,
                &[&store_id, &cutoff],
            )
            .await?;

        let mut observations = Vec::with_capacity(recent.len() + 1);
        for row in seed.iter().chain(recent.iter()) {
            if let Some(observation) = observation_from_row(store_id, row)? {
                observations.push(observation);
            }
        }

        let rules: Vec<BusinessHoursRule> = tx
            .query(
                r#"
                SELECT store_id, day_of_week, start_time_local, end_time_local
                FROM menu_hours
                WHERE store_id = $1
                ORDER BY id
                "#,
                &[&store_id],
            )
            .await?
            .into_iter()
            .map(BusinessHoursRule::try_from)
            .collect::<ReportResult<_>>()?;

        let timezone = tx
            .query_opt(
                "SELECT store_id, timezone_str FROM timezones WHERE store_id = $1",
                &[&store_id],
            )
            .await?;
        let timezone = match timezone {
            Some(row) => TimezoneAssignment::from_row(&row)?,
            None => None,
        };

        tx.commit().await?;

        Ok(Some(StoreSnapshot {
            store_id: store_id.to_string(),
            observations,
            rules,
            timezone,
        }))
    }
}

/// Fonte em memória, usada em testes e execuções locais.
#[derive(Debug, Default)]
pub struct MemoryStoreSource {
    snapshots: BTreeMap<String, StoreSnapshot>,
    failing: BTreeSet<String>,
}

impl MemoryStoreSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, snapshot: StoreSnapshot) -> Self {
        self.snapshots.insert(snapshot.store_id.clone(), snapshot);
        self
    }

    /// Loja listada normalmente, mas cuja leitura sempre falha.
    pub fn with_failing_store(mut self, store_id: impl Into<String>) -> Self {
        self.failing.insert(store_id.into());
        self
    }
}

#[async_trait]
impl StoreSource for MemoryStoreSource {
    async fn list_store_ids(&self) -> ReportResult<Vec<String>> {
        let ids: BTreeSet<&String> = self.snapshots.keys().chain(self.failing.iter()).collect();
        Ok(ids.into_iter().cloned().collect())
    }

    async fn store_exists(&self, store_id: &str) -> ReportResult<bool> {
        Ok(self.failing.contains(store_id)
            || self
                .snapshots
                .get(store_id)
                .is_some_and(|s| !s.observations.is_empty()))
    }

    async fn load_snapshot(
        &self,
        store_id: &str,
        lookback: Duration,
    ) -> ReportResult<Option<StoreSnapshot>> {
        if self.failing.contains(store_id) {
            return Err(ReportError::storage(format!(
                "falha simulada ao ler a loja {store_id}"
            )));
        }
        let Some(snapshot) = self.snapshots.get(store_id) else {
            return Ok(None);
        };
        let Some(reference) = snapshot.reference_instant() else {
            return Ok(None);
        };
        let cutoff = reference - lookback;

        let mut observations = snapshot.observations.clone();
        observations.sort_by_key(|o| o.timestamp);
        let first_recent = observations.partition_point(|o| o.timestamp < cutoff);
        let keep_from = first_recent.saturating_sub(1);

        Ok(Some(StoreSnapshot {
            observations: observations.split_off(keep_from),
            ..snapshot.clone()
        }))
    }
}
