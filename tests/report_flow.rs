use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use monitoramento_lojas::aggregate::{StoreTimeline, compute_row};
use monitoramento_lojas::config::Config;
use monitoramento_lojas::jobs::MemoryJobStore;
use monitoramento_lojas::service::{ArtifactFetch, JobPoll, ReportService};
use monitoramento_lojas::storage::MemoryStoreSource;
use monitoramento_lojas::types::{
    BusinessHoursRule, JobScope, Observation, ReportWindow, StoreSnapshot, StoreStatus,
    TimezoneAssignment,
};
use std::sync::Arc;

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, d, h, m, 0).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Loja noturna em São Paulo com polls a cada 50 minutos, alternando status.
fn night_store() -> StoreSnapshot {
    let mut snapshot = StoreSnapshot::new("noturna");
    snapshot.timezone = Some(TimezoneAssignment {
        store_id: "noturna".into(),
        zone_name: "America/Sao_Paulo".into(),
    });
    snapshot.rules = (0..7)
        .map(|day| BusinessHoursRule {
            store_id: "noturna".into(),
            day_of_week: day,
            open_local: hm(22, 0),
            close_local: hm(2, 0),
        })
        .collect();
    snapshot.observations = (0..300)
        .map(|i| {
            let status = if i % 4 == 0 {
                StoreStatus::Inactive
            } else {
                StoreStatus::Active
            };
            Observation::new("noturna", at(14, 0, 0) + Duration::minutes(50 * i), status)
        })
        .collect();
    snapshot
}

/// Loja com fuso inválido e um único dia de horário definido.
fn odd_store() -> StoreSnapshot {
    let mut snapshot = StoreSnapshot::new("estranha");
    snapshot.timezone = Some(TimezoneAssignment {
        store_id: "estranha".into(),
        zone_name: "Nowhere/Unknown".into(),
    });
    snapshot.rules = vec![BusinessHoursRule {
        store_id: "estranha".into(),
        day_of_week: 2,
        open_local: hm(8, 0),
        close_local: hm(0, 0),
    }];
    snapshot.observations = vec![
        Observation::new("estranha", at(15, 9, 0), StoreStatus::Active),
        Observation::new("estranha", at(18, 7, 15), StoreStatus::Inactive),
        Observation::new("estranha", at(20, 13, 40), StoreStatus::Active),
    ];
    snapshot
}

#[test]
fn durations_respect_bounds_for_every_window() {
    let config = Config::new("postgres://localhost/loop", "reports");
    for snapshot in [night_store(), odd_store()] {
        let timeline = StoreTimeline::from_snapshot(&snapshot, &config).expect("timeline");
        for window in ReportWindow::ALL {
            let durations = timeline.window_durations(window, config.look_around());
            assert!(durations.active <= durations.total, "{window:?}");
            assert!(durations.total <= window.span(), "{window:?}");
            assert!(durations.inactive() >= Duration::zero());
        }
        let row = compute_row(&snapshot, &config).expect("row");
        assert!(row.downtime_last_hour_min >= 0);
        assert!(row.downtime_last_day_hr >= 0);
        assert!(row.downtime_last_week_hr >= 0);
        // Cada parcela é arredondada separadamente: a soma pode passar uma unidade.
        assert!(row.uptime_last_hour_min + row.downtime_last_hour_min <= 61);
        assert!(row.uptime_last_week_hr + row.downtime_last_week_hr <= 169);
        assert_eq!(compute_row(&snapshot, &config), Some(row));
    }
}

#[tokio::test]
async fn full_report_is_written_and_served() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = MemoryStoreSource::new()
        .with_store(night_store())
        .with_store(odd_store())
        .with_store(StoreSnapshot::new("sem-polls"));
    let config = Config::new("postgres://localhost/loop", dir.path());
    let service = ReportService::new(config, Arc::new(source), Arc::new(MemoryJobStore::new()));

    let job_id = service.trigger(JobScope::AllStores).await.expect("trigger");
    let poll = service
        .wait_for(&job_id, std::time::Duration::from_millis(5))
        .await
        .expect("wait");
    assert!(matches!(poll, JobPoll::Complete { .. }));
    assert_eq!(service.job(&job_id).await.expect("job").detail, None);

    let ArtifactFetch::Ready { bytes, .. } = service.fetch_artifact(&job_id).await.expect("fetch")
    else {
        panic!("relatório deveria estar disponível");
    };
    let csv = String::from_utf8(bytes).expect("utf8");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("store_id,uptime_last_hour(minutes)"));
    // Ordem de processamento: ids em ordem alfabética; a loja sem polls é ignorada.
    assert!(lines[1].starts_with("estranha,"));
    assert!(lines[2].starts_with("noturna,"));
}
