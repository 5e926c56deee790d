//! aggregate.rs — Soma das durações por janela retroativa e linha final da loja.

use crate::calendar::BusinessCalendar;
use crate::config::{Config, RoundingRule};
use crate::timeline::{Durations, interpolate};
use crate::timezone::resolve_zone;
use crate::types::{Observation, ReportRow, ReportWindow, StoreSnapshot};
use crate::window::business_utc_intervals;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Entradas já resolvidas do cálculo de uma loja.
#[derive(Debug, Clone)]
pub struct StoreTimeline {
    pub store_id: String,
    pub observations: Vec<Observation>,
    pub calendar: BusinessCalendar,
    pub tz: Tz,
    pub reference: DateTime<Utc>,
}

impl StoreTimeline {
    /// `None` quando a loja não tem nenhum poll (sem instante de referência).
    pub fn from_snapshot(snapshot: &StoreSnapshot, config: &Config) -> Option<Self> {
        let reference = snapshot.reference_instant()?;
        let mut observations = snapshot.observations.clone();
        // sort estável: empates preservam a ordem da fonte
        observations.sort_by_key(|o| o.timestamp);
        let tz = resolve_zone(
            &snapshot.store_id,
            snapshot.timezone.as_ref().map(|t| t.zone_name.as_str()),
            config.default_tz(),
        );
        Some(Self {
            store_id: snapshot.store_id.clone(),
            observations,
            calendar: BusinessCalendar::from_rules(&snapshot.rules),
            tz,
            reference,
        })
    }

    /// Durações dentro do horário comercial para `[reference - span, reference]`.
    pub fn window_durations(&self, window: ReportWindow, margin: Duration) -> Durations {
        business_durations(
            &self.observations,
            &self.calendar,
            self.tz,
            self.reference - window.span(),
            self.reference,
            margin,
        )
    }
}

/// Percorre `[start, end]` um dia por vez somando cada sub-intervalo comercial.
pub fn business_durations(
    observations: &[Observation],
    calendar: &BusinessCalendar,
    tz: Tz,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    margin: Duration,
) -> Durations {
    let mut totals = Durations::default();
    let mut chunk_start = start;
    while chunk_start < end {
        let chunk_end = (chunk_start + Duration::days(1)).min(end);
        for interval in business_utc_intervals(calendar, tz, chunk_start, chunk_end) {
            totals += interpolate(observations, interval.start, interval.end, margin);
        }
        chunk_start = chunk_end;
    }
    totals
}

fn seconds(duration: Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => duration.num_seconds() as f64,
    }
}

/// (uptime, downtime) na unidade da janela.
pub fn to_units(durations: Durations, window: ReportWindow, rounding: RoundingRule) -> (i64, i64) {
    let unit = window.unit_seconds();
    (
        rounding.apply(seconds(durations.active) / unit),
        rounding.apply(seconds(durations.inactive()) / unit),
    )
}

/// Calcula a linha do relatório de uma loja.
pub fn compute_row(snapshot: &StoreSnapshot, config: &Config) -> Option<ReportRow> {
    let timeline = StoreTimeline::from_snapshot(snapshot, config)?;
    let margin = config.look_around();

    let [hour, day, week] = ReportWindow::ALL.map(|window| {
        let durations = timeline.window_durations(window, margin);
        debug!(
            "[LOJA {}] {:?}: ativo={}s comercial={}s",
            timeline.store_id,
            window,
            durations.active.num_seconds(),
            durations.total.num_seconds()
        );
        to_units(durations, window, config.rounding)
    });

    Some(ReportRow {
        store_id: timeline.store_id,
        uptime_last_hour_min: hour.0,
        uptime_last_day_hr: day.0,
        uptime_last_week_hr: week.0,
        downtime_last_hour_min: hour.1,
        downtime_last_day_hr: day.1,
        downtime_last_week_hr: week.1,
    })
}
