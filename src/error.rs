use thiserror::Error;

/// Erros do pipeline de relatórios.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Loja ou job inexistente. Repassado ao chamador, sem retry.
    #[error("não encontrado: {0}")]
    NotFound(String),
    #[error("erro de armazenamento: {0}")]
    Storage(String),
    #[error("erro de artefato: {0}")]
    Artifact(String),
    #[error("configuração inválida: {0}")]
    InvalidConfig(String),
    /// Tentativa de uma segunda escrita terminal no mesmo job.
    #[error("job {0} já finalizado")]
    JobAlreadyFinished(String),
}

impl ReportError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

impl From<tokio_postgres::Error> for ReportError {
    fn from(value: tokio_postgres::Error) -> Self {
        ReportError::storage(value.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ReportError {
    fn from(value: deadpool_postgres::PoolError) -> Self {
        ReportError::storage(value.to_string())
    }
}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        ReportError::Artifact(value.to_string())
    }
}
