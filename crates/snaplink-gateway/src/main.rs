use clap::Parser;
use snaplink_cache::{MokaUrlCache, NoopUrlCache, RedisUrlCache};
use snaplink_core::{Repository, UrlCache};
use snaplink_gateway::cli::{CacheBackendArg, Cli, StorageBackendArg};
use snaplink_gateway::telemetry::init_tracing;
use snaplink_gateway::{App, AppState};
use snaplink_generator::RandomGenerator;
use snaplink_redirector::{Redirector, RedirectorService, VisitWorker};
use snaplink_shortener::{Shortener, ShortenerService};
use snaplink_storage::{InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MYSQL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    info!(
        listen_addr = %cli.listen_addr,
        base_url = %cli.base_url,
        storage_backend = %cli.storage,
        cache_backend = %cli.cache,
        "starting snaplink gateway"
    );

    let (repository, mysql) = build_repository(&cli).await?;
    let cache = build_cache(&cli).await;

    let (visits, worker) = VisitWorker::spawn(Arc::clone(&repository), cli.visit_worker_config());

    let shortener: Arc<dyn Shortener> = Arc::new(ShortenerService::with_config(
        Arc::clone(&repository),
        RandomGenerator::new(),
        cli.shortener_config(),
    ));
    let redirector: Arc<dyn Redirector> = Arc::new(RedirectorService::with_config(
        Arc::clone(&repository),
        cache,
        visits,
        cli.redirector_config(),
    ));

    let app = App::router(AppState::new(shortener, redirector, cli.base_url.clone()));

    let listener = tokio::net::TcpListener::bind(cli.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last visit recorder.
    worker.join().await;
    if let Some(mysql) = mysql {
        mysql.close().await;
    }

    info!("snaplink gateway stopped");
    Ok(())
}

async fn build_repository(
    cli: &Cli,
) -> Result<(Arc<dyn Repository>, Option<MySqlRepository>), Box<dyn std::error::Error + Send + Sync>>
{
    match cli.storage {
        StorageBackendArg::InMemory => {
            let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
            Ok((repository, None))
        }
        StorageBackendArg::Mysql => {
            let dsn = cli
                .mysql_dsn
                .as_deref()
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let repository =
                MySqlRepository::connect(dsn, cli.mysql_max_connections, MYSQL_ACQUIRE_TIMEOUT)
                    .await?;
            repository.ensure_schema().await?;
            let shared: Arc<dyn Repository> = Arc::new(repository.clone());
            Ok((shared, Some(repository)))
        }
    }
}

async fn build_cache(cli: &Cli) -> Arc<dyn UrlCache> {
    match cli.cache {
        CacheBackendArg::Memory => Arc::new(MokaUrlCache::new()),
        CacheBackendArg::None => Arc::new(NoopUrlCache::new()),
        CacheBackendArg::Redis => {
            let Some(redis_url) = cli.redis_url.as_deref() else {
                warn!("no redis url configured, running without a cache");
                return Arc::new(NoopUrlCache::new());
            };
            match RedisUrlCache::connect(redis_url).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!(error = %e, "redis unreachable, running without a cache");
                    Arc::new(NoopUrlCache::new())
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
