use crate::error::{ReportError, ReportResult};
use chrono::Duration;
use chrono_tz::Tz;
use config as config_crate;
use serde::Deserialize;
use std::path::PathBuf;

/// Regra de arredondamento segundos → minutos/horas.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundingRule {
    /// 0.5 arredonda para longe de zero (29.5 → 30).
    #[default]
    HalfAwayFromZero,
    /// 0.5 arredonda para o par mais próximo (29.5 → 30, 30.5 → 30).
    HalfEven,
    /// Trunca (29.9 → 29).
    Down,
}

impl RoundingRule {
    pub fn apply(&self, value: f64) -> i64 {
        let rounded = match self {
            RoundingRule::HalfAwayFromZero => value.round(),
            RoundingRule::HalfEven => value.round_ties_even(),
            RoundingRule::Down => value.trunc(),
        };
        rounded as i64
    }
}

/// Configuração operacional do sistema, passada explicitamente ao pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URL de conexão com o banco PostgreSQL.
    pub database_url: String,
    /// Diretório onde os CSVs dos relatórios são gravados.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    /// Fuso usado quando a loja não tem fuso ou o fuso é desconhecido.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Margem, em segundos, para buscar polls ao redor de cada intervalo.
    #[serde(default = "default_look_around_secs")]
    pub look_around_secs: i64,
    #[serde(default)]
    pub rounding: RoundingRule,
    /// Jobs executados ao mesmo tempo.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Intervalo de polling do status do job (binário).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_timezone() -> String {
    crate::timezone::DEFAULT_TIMEZONE.to_string()
}

/// Maior margem de tolerância aceita (um dia).
pub const MAX_LOOK_AROUND_SECS: i64 = 86_400;

fn default_look_around_secs() -> i64 {
    3600
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Config {
    /// Configuração com os valores padrão.
    pub fn new(database_url: impl Into<String>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            reports_dir: reports_dir.into(),
            default_timezone: default_timezone(),
            look_around_secs: default_look_around_secs(),
            rounding: RoundingRule::default(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }

    /// Lê `config.{toml,yaml,json}` (opcional) e variáveis `LOJAS_*`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config_crate::Config::builder()
            .add_source(config_crate::File::with_name("config").required(false))
            .add_source(config_crate::Environment::with_prefix("LOJAS").try_parsing(true))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReportResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "database_url não pode ser vazio".into(),
            ));
        }
        if self.default_timezone.parse::<Tz>().is_err() {
            return Err(ReportError::InvalidConfig(format!(
                "default_timezone desconhecido: {}",
                self.default_timezone
            )));
        }
        if self.look_around_secs < 0 {
            return Err(ReportError::InvalidConfig(
                "look_around_secs não pode ser negativo".into(),
            ));
        }
        if self.look_around_secs > MAX_LOOK_AROUND_SECS {
            return Err(ReportError::InvalidConfig(format!(
                "look_around_secs acima do máximo ({MAX_LOOK_AROUND_SECS})"
            )));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ReportError::InvalidConfig(
                "max_concurrent_jobs deve ser maior que zero".into(),
            ));
        }
        Ok(())
    }

    pub fn default_tz(&self) -> Tz {
        self.default_timezone
            .parse()
            .unwrap_or(crate::timezone::FALLBACK_TZ)
    }

    /// Margem limitada a `[0, MAX_LOOK_AROUND_SECS]` mesmo sem `validate`.
    pub fn look_around(&self) -> Duration {
        Duration::seconds(self.look_around_secs.clamp(0, MAX_LOOK_AROUND_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_rules_differ_only_on_ties_and_truncation() {
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(29.5), 30);
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(30.5), 31);
        assert_eq!(RoundingRule::HalfEven.apply(30.5), 30);
        assert_eq!(RoundingRule::HalfEven.apply(29.5), 30);
        assert_eq!(RoundingRule::Down.apply(29.99), 29);
        assert_eq!(RoundingRule::HalfAwayFromZero.apply(167.999_99), 168);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = Config::new("postgres://localhost/loop", "reports");
        assert!(config.validate().is_ok());
        assert_eq!(config.default_tz(), chrono_tz::America::Chicago);

        let mut bad_zone = config.clone();
        bad_zone.default_timezone = "Mars/Olympus".into();
        assert!(matches!(
            bad_zone.validate(),
            Err(ReportError::InvalidConfig(_))
        ));

        let mut no_workers = config.clone();
        no_workers.max_concurrent_jobs = 0;
        assert!(no_workers.validate().is_err());

        let mut no_db = config;
        no_db.database_url = " ".into();
        assert!(no_db.validate().is_err());
    }

    #[test]
    fn look_around_is_bounded() {
        let mut config = Config::new("postgres://localhost/loop", "reports");
        config.look_around_secs = MAX_LOOK_AROUND_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(config.look_around(), Duration::days(1));

        config.look_around_secs = i64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ReportError::InvalidConfig(_))
        ));
        assert_eq!(config.look_around(), Duration::days(1));

        config.look_around_secs = -5;
        assert!(config.validate().is_err());
        assert_eq!(config.look_around(), Duration::zero());
    }

    #[test]
    fn rounding_rule_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            rounding: RoundingRule,
        }
        let holder: Holder = serde_json::from_str(r#"{"rounding":"half_even"}"#).unwrap();
        assert_eq!(holder.rounding, RoundingRule::HalfEven);
    }
}
