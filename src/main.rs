use anyhow::Result;
use monitoramento_lojas::{
    config::Config,
    service::{JobPoll, ReportService},
    storage::Storage,
    types::JobScope,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Carrega e valida a configuração da aplicação
    let config = Config::load()?;
    config.validate()?;
    info!("Configuração carregada: relatórios em {}", config.reports_dir.display());

    // Conecta ao banco de dados (pool compartilhado entre leitura e status dos jobs)
    let storage = Arc::new(Storage::connect(&config.database_url).await?);
    info!("Banco de dados conectado");

    // Loja opcional na linha de comando; sem argumento, todas as lojas
    let scope = match std::env::args().nth(1) {
        Some(store_id) => JobScope::Store(store_id),
        None => JobScope::AllStores,
    };

    let poll_interval = Duration::from_secs(config.poll_interval_secs.max(1));
    let service = ReportService::new(config, storage.clone(), storage);
    let job_id = service.trigger(scope).await?;
    info!("[JOB {}] Relatório disparado", job_id);

    match service.wait_for(&job_id, poll_interval).await? {
        JobPoll::Complete { artifact } => {
            info!("[JOB {}] Relatório completo: {:?}", job_id, artifact);
        }
        JobPoll::Error { detail } => {
            error!("[JOB {}] Relatório falhou: {:?}", job_id, detail);
        }
        JobPoll::Running => {}
    }

    let job = service.job(&job_id).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
