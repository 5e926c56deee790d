//! timezone.rs — Conversão local ↔ UTC por loja, com política para horário de verão.
//!
//! - Horário ambíguo (volta do horário de verão): prefere a interpretação sem DST.
//! - Horário inexistente (adiantamento do relógio): avança uma hora e tenta de novo.
//! - Fuso desconhecido: usa o fuso padrão e segue o processamento.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use tracing::{debug, warn};

/// Fuso padrão quando a loja não tem fuso atribuído.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";
pub const FALLBACK_TZ: Tz = chrono_tz::America::Chicago;

/// Correção aplicada a um horário que cai no buraco do horário de verão.
const DST_GAP_CORRECTION_SECS: i64 = 3600;

/// Resolve o fuso da loja, caindo para `default` se ausente ou desconhecido.
pub fn resolve_zone(store_id: &str, zone_name: Option<&str>, default: Tz) -> Tz {
    match zone_name.map(str::trim) {
        None | Some("") => {
            debug!("[LOJA {}] Sem fuso atribuído, usando {}.", store_id, default);
            default
        }
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "[LOJA {}] Fuso desconhecido '{}'. Usando {}.",
                    store_id, name, default
                );
                default
            }
        },
    }
}

/// Converte um horário local ingênuo para UTC. Nunca falha.
pub fn to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(first, second) => {
            let chosen = if first.offset().dst_offset() == Duration::zero() {
                first
            } else if second.offset().dst_offset() == Duration::zero() {
                second
            } else {
                first.max(second)
            };
            debug!(
                "Horário ambíguo {} em {}: usando {}.",
                local,
                tz,
                chosen.offset()
            );
            chosen.with_timezone(&Utc)
        }
        LocalResult::None => {
            let shifted = local + Duration::seconds(DST_GAP_CORRECTION_SECS);
            debug!(
                "Horário inexistente {} em {}: avançando para {}.",
                local, tz, shifted
            );
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
                LocalResult::None => {
                    // Buraco maior que a correção: lê a hora com o offset vigente nesse instante.
                    let offset = tz.offset_from_utc_datetime(&local).fix();
                    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
                    Utc.from_utc_datetime(&utc)
                }
            }
        }
    }
}

/// Converte um instante UTC para o horário local ingênuo da loja.
pub fn to_local(utc: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    utc.with_timezone(&tz).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&naive(y, m, d, h, min))
    }

    #[test]
    fn unambiguous_time_converts_directly() {
        let tz = chrono_tz::America::Chicago;
        // Janeiro: CST, UTC-6.
        assert_eq!(to_utc(naive(2023, 1, 22, 9, 0), tz), utc(2023, 1, 22, 15, 0));
        assert_eq!(to_local(utc(2023, 1, 22, 15, 0), tz), naive(2023, 1, 22, 9, 0));
    }

    #[test]
    fn ambiguous_time_prefers_standard_offset() {
        let tz = chrono_tz::America::Chicago;
        // 2024-11-03 01:30 acontece duas vezes: CDT (06:30Z) e CST (07:30Z).
        assert_eq!(to_utc(naive(2024, 11, 3, 1, 30), tz), utc(2024, 11, 3, 7, 30));
    }

    #[test]
    fn nonexistent_time_is_shifted_forward() {
        let tz = chrono_tz::America::New_York;
        // 2024-03-10 02:30 não existe; 03:30 EDT = 07:30Z.
        assert_eq!(to_utc(naive(2024, 3, 10, 2, 30), tz), utc(2024, 3, 10, 7, 30));
    }

    #[test]
    fn unknown_or_missing_zone_falls_back_to_default() {
        let default = FALLBACK_TZ;
        assert_eq!(resolve_zone("loja", Some("Mars/Olympus"), default), default);
        assert_eq!(resolve_zone("loja", None, default), default);
        assert_eq!(resolve_zone("loja", Some("  "), default), default);
        assert_eq!(
            resolve_zone("loja", Some("Asia/Kolkata"), default),
            chrono_tz::Asia::Kolkata
        );
    }
}
