//! artifact.rs — Gravação e leitura do CSV do relatório.

use crate::error::ReportResult;
use crate::types::ReportRow;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const HEADER: [&str; 7] = [
    "store_id",
    "uptime_last_hour(minutes)",
    "uptime_last_day(hours)",
    "uptime_last_week(hours)",
    "downtime_last_hour(minutes)",
    "downtime_last_day(hours)",
    "downtime_last_week(hours)",
];

/// Resultado da leitura de um artefato. Problemas não são fatais: o registro
/// do job continua sendo a fonte da verdade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRead {
    Ready { file_name: String, bytes: Vec<u8> },
    Unavailable { reason: String },
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

pub fn render_csv(rows: &[ReportRow]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            escape(&row.store_id),
            row.uptime_last_hour_min,
            row.uptime_last_day_hr,
            row.uptime_last_week_hr,
            row.downtime_last_hour_min,
            row.downtime_last_day_hr,
            row.downtime_last_week_hr,
        ));
    }
    out
}

/// Grava `<reports_dir>/<job_id>.csv` e devolve o caminho.
pub async fn write_report(
    reports_dir: &Path,
    job_id: &str,
    rows: &[ReportRow],
) -> ReportResult<PathBuf> {
    fs::create_dir_all(reports_dir).await?;
    let path = reports_dir.join(format!("{job_id}.csv"));
    fs::write(&path, render_csv(rows)).await?;
    info!("[JOB {}] CSV gravado em {}", job_id, path.display());
    Ok(path)
}

/// Lê o artefato, recusando caminhos fora de `reports_dir`.
pub async fn read_report(reports_dir: &Path, artifact_path: Option<&Path>) -> ArtifactRead {
    let Some(path) = artifact_path else {
        return unavailable("caminho do relatório ausente");
    };
    let resolved = match fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return unavailable("arquivo do relatório não encontrado");
        }
        Err(e) => return unavailable(format!("falha ao resolver o relatório: {e}")),
    };
    let allowed = match fs::canonicalize(reports_dir).await {
        Ok(dir) => dir,
        Err(e) => return unavailable(format!("diretório de relatórios inválido: {e}")),
    };
    if !resolved.starts_with(&allowed) {
        warn!(
            "Relatório {} fora do diretório {}. Leitura recusada.",
            resolved.display(),
            allowed.display()
        );
        return unavailable("relatório fora do diretório esperado");
    }

    let file_name = resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match fs::read(&resolved).await {
        Ok(bytes) => ArtifactRead::Ready { file_name, bytes },
        Err(e) => unavailable(format!("falha ao ler o relatório: {e}")),
    }
}

fn unavailable(reason: impl Into<String>) -> ArtifactRead {
    ArtifactRead::Unavailable {
        reason: reason.into(),
    }
}
