//! window.rs — Interseção do horário comercial local com uma janela UTC.

use crate::calendar::{BusinessCalendar, end_of_day};
use crate::timezone::{to_local, to_utc};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Intervalo UTC semiaberto com duração positiva.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// `None` se a duração não for positiva.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Sub-intervalos UTC, ordenados e sem sobreposição, em que a loja deveria
/// estar aberta dentro de `[window_start, window_end]`.
pub fn business_utc_intervals(
    calendar: &BusinessCalendar,
    tz: Tz,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Interval> {
    if window_end <= window_start {
        return Vec::new();
    }

    let first_date = to_local(window_start, tz).date();
    let last_date = to_local(window_end, tz).date();

    let mut pieces = Vec::new();
    for date in first_date.iter_days().take_while(|d| *d <= last_date) {
        for local in calendar.hours_for(date) {
            let start = to_utc(local.start, tz).max(window_start);
            let end = to_utc(closing_instant(local.end), tz).min(window_end);
            if let Some(piece) = Interval::new(start, end) {
                pieces.push(piece);
            }
        }
    }
    merge(pieces)
}

/// Fechamento em `end_of_day()` conta até a meia-noite seguinte; sem isso cada
/// dia perde 1µs e dias consecutivos não se unem.
fn closing_instant(end: NaiveDateTime) -> NaiveDateTime {
    if end.time() != end_of_day() {
        return end;
    }
    match end.date().succ_opt() {
        Some(next) => next.and_time(NaiveTime::MIN),
        None => end,
    }
}

/// Une intervalos sobrepostos ou encostados.
fn merge(mut pieces: Vec<Interval>) -> Vec<Interval> {
    pieces.sort();
    let mut merged: Vec<Interval> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match merged.last_mut() {
            Some(last) if piece.start <= last.end => last.end = last.end.max(piece.end),
            _ => merged.push(piece),
        }
    }
    merged
}
