//! timeline.rs — Reconstrução do status da loja entre polls esparsos.
//!
//! O status vale do poll até o próximo poll. Antes do primeiro poll conhecido
//! a loja é considerada inativa.

use crate::types::{Observation, StoreStatus};
use chrono::{DateTime, Duration, Utc};
use std::ops::{Add, AddAssign};

/// Tempo ativo e tempo total dentro de um ou mais intervalos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durations {
    pub active: Duration,
    pub total: Duration,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            active: Duration::zero(),
            total: Duration::zero(),
        }
    }
}

impl Durations {
    /// `max(0, total - active)`.
    pub fn inactive(&self) -> Duration {
        (self.total - self.active).max(Duration::zero())
    }
}

impl Add for Durations {
    type Output = Durations;

    fn add(self, other: Durations) -> Durations {
        Durations {
            active: self.active + other.active,
            total: self.total + other.total,
        }
    }
}

impl AddAssign for Durations {
    fn add_assign(&mut self, other: Durations) {
        *self = *self + other;
    }
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Open,
    Poll(StoreStatus),
    Close,
}

/// Mede quanto de `[start, end]` a loja passou ativa.
///
/// `observations` deve estar ordenado por timestamp. Só entram na linha do
/// tempo os polls a até `margin` do intervalo; o status inicial vem do último
/// poll estritamente anterior a `start`.
pub fn interpolate(
    observations: &[Observation],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    margin: Duration,
) -> Durations {
    debug_assert!(observations.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    if end <= start {
        return Durations::default();
    }

    let seed = observations.partition_point(|o| o.timestamp < start);
    let lower = observations.partition_point(|o| o.timestamp < start - margin);
    let upper = observations.partition_point(|o| o.timestamp <= end + margin);

    let mut status = match seed.checked_sub(1) {
        Some(index) => observations[index].status,
        None => StoreStatus::Inactive,
    };

    let nearby = observations.get(lower..upper).unwrap_or_default();
    let mut events = Vec::with_capacity(nearby.len() + 2);
    events.push((start, Event::Open));
    events.extend(nearby.iter().map(|o| (o.timestamp, Event::Poll(o.status))));
    events.push((end, Event::Close));
    // Ordenação estável: empates mantêm Open antes dos polls e Close depois.
    events.sort_by_key(|(timestamp, _)| *timestamp);

    let mut durations = Durations::default();
    let mut previous = start;
    let last = events.len() - 1;
    for (index, (timestamp, event)) in events.into_iter().enumerate() {
        let clipped = timestamp.clamp(start, end);
        if clipped > previous {
            let gap = clipped - previous;
            durations.total += gap;
            if status == StoreStatus::Active {
                durations.active += gap;
            }
            previous = clipped;
        }
        match event {
            Event::Poll(polled) => status = polled,
            Event::Close if index == last => status = StoreStatus::Inactive,
            Event::Open | Event::Close => {}
        }
    }
    durations
}
