use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use helio_cache::{MemoryDocumentStore, TokenCache};
use helio_domain::ingest_service::TelemetryIngestService;
use helio_domain::provider::{DataProvider, ProviderRegistry};
use helio_domain::stores::DocumentStore;
use helio_ingest::config::ServiceConfig;
use helio_ingest::local::LoggingPublisher;
use helio_ingest::routes::{router, AppState};
use helio_ingest::secrets::EnvSecretStore;
use helio_nats::{
    BatchingTelemetryProducer, ContextPublisher, JetStreamPublisher, NatsClient,
    NatsKvDocumentStore,
};
use helio_providers::{
    AlsoEnergyAdapter, AlsoEnergyConfig, HttpDeviceRegistry, KmcAdapter, KmcConfig, RetryPolicy,
};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting helio-ingest service");
    info!("Configuration: {:?}", config);

    if let Err(e) = run(config).await {
        error!("Service failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> Result<()> {
    let (document_store, publisher): (Arc<dyn DocumentStore>, Arc<dyn JetStreamPublisher>) =
        if config.local_mode {
            info!("Local mode: in-memory document store, log-only publisher");
            (Arc::new(MemoryDocumentStore::new()), Arc::new(LoggingPublisher))
        } else {
            let nats = NatsClient::connect(
                &config.nats_url,
                Duration::from_secs(config.startup_timeout_secs),
            )
            .await?;
            nats.ensure_stream(&config.nats_stream).await?;
            let bucket = nats.ensure_kv_bucket(&config.kv_bucket).await?;

            (
                Arc::new(NatsKvDocumentStore::new(bucket)),
                Arc::new(ContextPublisher::new(nats.jetstream().clone())),
            )
        };

    let retry = RetryPolicy {
        max_retries: config.max_retries,
        ..Default::default()
    };
    let http_timeout = Duration::from_secs(config.http_timeout_secs);

    let token_cache = Arc::new(TokenCache::new(
        document_store.clone(),
        Duration::from_secs(config.lock_ttl_secs),
        Duration::from_secs(config.token_ttl_secs),
        config.cache_enabled,
    ));

    let also_energy = AlsoEnergyAdapter::new(
        AlsoEnergyConfig {
            base_url: config.also_energy_base_url.clone(),
            timeout: http_timeout,
            retry: retry.clone(),
        },
        token_cache,
    )?;
    let kmc = KmcAdapter::new(KmcConfig {
        base_url: config.kmc_base_url.clone(),
        timeout: http_timeout,
        retry: retry.clone(),
    })?;

    let registry = ProviderRegistry::new()
        .register(DataProvider::AlsoEnergy, Arc::new(also_energy))
        .register(DataProvider::Kmc, Arc::new(kmc));

    let producer = BatchingTelemetryProducer::new(publisher, config.nats_subject.clone());
    let device_registry = HttpDeviceRegistry::new(
        config.device_api_base_url.clone(),
        http_timeout,
        retry,
    )?;

    let service = TelemetryIngestService::new(
        Arc::new(registry),
        Arc::new(EnvSecretStore::new()),
        Arc::new(producer),
        Arc::new(device_registry),
    );

    let app = router(AppState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    let shutdown = CancellationToken::new();
    tokio::spawn(signal_listener(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    info!("Service stopped gracefully");
    Ok(())
}

async fn signal_listener(shutdown: CancellationToken) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
