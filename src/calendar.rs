//! calendar.rs — Horário comercial por data local.
//!
//! Regras por dia da semana (0 = segunda). Dia sem regra: aberto o dia todo.
//! Fechamento à meia-noite: fim do dia. Fechamento <= abertura: vira o dia.

use crate::types::BusinessHoursRule;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use tracing::warn;

/// Último instante representável do dia local (23:59:59.999999).
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

/// Janela de funcionamento em horário local ingênuo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Copy)]
struct DayHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl DayHours {
    /// Fecha depois da meia-noite (não conta fechamento exatamente à meia-noite).
    fn wraps(&self) -> bool {
        self.close != NaiveTime::MIN && self.close <= self.open
    }

    fn window_on(&self, date: NaiveDate) -> LocalWindow {
        let end = if self.close == NaiveTime::MIN {
            date.and_time(end_of_day())
        } else if self.wraps() {
            date.succ_opt().unwrap_or(date).and_time(self.close)
        } else {
            date.and_time(self.close)
        };
        LocalWindow {
            start: date.and_time(self.open),
            end,
        }
    }
}

/// Calendário comercial de uma loja.
#[derive(Debug, Clone, Default)]
pub struct BusinessCalendar {
    by_weekday: HashMap<u32, Vec<DayHours>>,
}

impl BusinessCalendar {
    /// Calendário sem regras: todos os dias abertos 24h.
    pub fn always_open() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &[BusinessHoursRule]) -> Self {
        let mut by_weekday: HashMap<u32, Vec<DayHours>> = HashMap::new();
        for rule in rules {
            let day = match u32::try_from(rule.day_of_week) {
                Ok(day) if day <= 6 => day,
                _ => {
                    warn!(
                        "[LOJA {}] day_of_week inválido: {}. Regra ignorada.",
                        rule.store_id, rule.day_of_week
                    );
                    continue;
                }
            };
            by_weekday.entry(day).or_default().push(DayHours {
                open: rule.open_local,
                close: rule.close_local,
            });
        }
        Self { by_weekday }
    }

    /// Janelas locais que tocam `date`, incluindo a sobra da virada do dia anterior.
    pub fn hours_for(&self, date: NaiveDate) -> Vec<LocalWindow> {
        let mut windows = Vec::new();
        match self.by_weekday.get(&weekday(date)) {
            Some(hours) => windows.extend(hours.iter().map(|h| h.window_on(date))),
            None => windows.push(LocalWindow {
                start: date.and_time(NaiveTime::MIN),
                end: date.and_time(end_of_day()),
            }),
        }

        if let Some(previous) = date.pred_opt() {
            if let Some(hours) = self.by_weekday.get(&weekday(previous)) {
                windows.extend(hours.iter().filter(|h| h.wraps()).map(|h| LocalWindow {
                    start: date.and_time(NaiveTime::MIN),
                    end: date.and_time(h.close),
                }));
            }
        }
        windows
    }
}

fn weekday(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(day: i32, open: (u32, u32), close: (u32, u32)) -> BusinessHoursRule {
        BusinessHoursRule {
            store_id: "loja".into(),
            day_of_week: day,
            open_local: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            close_local: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn missing_weekday_is_open_all_day() {
        // 2024-01-01 é segunda; só há regra para terça.
        let calendar = BusinessCalendar::from_rules(&[rule(1, (9, 0), (17, 0))]);
        let day = date(2024, 1, 1);
        assert_eq!(
            calendar.hours_for(day),
            vec![LocalWindow {
                start: day.and_time(NaiveTime::MIN),
                end: day.and_time(end_of_day()),
            }]
        );
    }

    #[test]
    fn midnight_close_equals_end_of_day() {
        let midnight = BusinessCalendar::from_rules(&[rule(0, (9, 0), (0, 0))]);
        let explicit = BusinessCalendar::from_rules(&[BusinessHoursRule {
            close_local: end_of_day(),
            ..rule(0, (9, 0), (0, 0))
        }]);
        let day = date(2024, 1, 1);
        assert_eq!(midnight.hours_for(day), explicit.hours_for(day));
        // Fechar à meia-noite não gera sobra no dia seguinte.
        assert_eq!(midnight.hours_for(date(2024, 1, 2)).len(), 1);
    }

    #[test]
    fn overnight_rule_wraps_and_spills_into_next_date() {
        let calendar = BusinessCalendar::from_rules(&[
            rule(0, (22, 0), (2, 0)),
            rule(1, (10, 0), (18, 0)),
        ]);
        let monday = date(2024, 1, 1);
        let tuesday = date(2024, 1, 2);

        assert_eq!(
            calendar.hours_for(monday),
            vec![LocalWindow {
                start: monday.and_hms_opt(22, 0, 0).unwrap(),
                end: tuesday.and_hms_opt(2, 0, 0).unwrap(),
            }]
        );
        assert_eq!(
            calendar.hours_for(tuesday),
            vec![
                LocalWindow {
                    start: tuesday.and_hms_opt(10, 0, 0).unwrap(),
                    end: tuesday.and_hms_opt(18, 0, 0).unwrap(),
                },
                LocalWindow {
                    start: tuesday.and_time(NaiveTime::MIN),
                    end: tuesday.and_hms_opt(2, 0, 0).unwrap(),
                },
            ]
        );
    }

    #[test]
    fn out_of_range_weekday_is_ignored() {
        let calendar = BusinessCalendar::from_rules(&[rule(9, (9, 0), (17, 0))]);
        let day = date(2024, 1, 3);
        assert_eq!(calendar.hours_for(day), BusinessCalendar::always_open().hours_for(day));
    }
}
