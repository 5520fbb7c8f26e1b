//! Main service lifecycle.
//!
//! Wires the store, provider, cache and renderer into the engine, starts the
//! background workers and serves HTTP until SIGINT or SIGTERM. Workers are
//! cancelled and joined before `run` returns.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::http::router;
use boot_script::{
    BackgroundWorkers, BootScriptService, MemoryNodeStore, NodeProvider, NodeStore, NodeSynchronizer,
    ScriptCache, ScriptRenderer, build_provider,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Running Boot Script Service
pub struct Controller {
    config: ServiceConfig,
    service: Arc<BootScriptService>,
    workers: BackgroundWorkers,
}

impl Controller {
    /// Build the engine from `config` and start background workers.
    ///
    /// Fails when the boot configurations file or the provider cannot be
    /// loaded. An unreachable HSM is not fatal; it is reported by `/health`.
    pub async fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        info!("Initializing Boot Script Service");

        let store: Arc<dyn NodeStore> = Arc::new(MemoryNodeStore::with_boot_configurations(
            config.load_boot_configurations()?,
        ));

        let provider: Option<Arc<dyn NodeProvider>> = match &config.provider {
            Some(provider_config) => {
                let provider = build_provider(provider_config).await?;
                if let Err(e) = provider.health_check().await {
                    warn!("{} provider is not healthy yet (will continue): {}", provider.provider_type(), e);
                }
                Some(provider)
            }
            None => None,
        };

        let cache = Arc::new(ScriptCache::new(config.cache.ttl()));
        let synchronizer = provider
            .as_ref()
            .filter(|_| config.sync_active())
            .map(|provider| {
                Arc::new(NodeSynchronizer::new(
                    Arc::clone(provider),
                    Arc::clone(&store),
                    Some(Arc::clone(&cache)),
                    config.sync.clone(),
                ))
            });

        let service = Arc::new(
            BootScriptService::new(
                store,
                provider,
                Arc::clone(&cache),
                ScriptRenderer::new(config.renderer.clone()),
            )
            .with_provider_timeout(config.provider_timeout()),
        );
        let workers = BackgroundWorkers::spawn(cache, synchronizer, CancellationToken::new());

        Ok(Self {
            config,
            service,
            workers,
        })
    }

    pub fn service(&self) -> &Arc<BootScriptService> {
        &self.service
    }

    /// Serve until a shutdown signal, then stop background workers
    pub async fn run(self) -> Result<(), ServiceError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!("Boot Script Service listening on http://{}", listener.local_addr()?);

        let app = router(Arc::clone(&self.service), self.config.request_timeout());
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.workers.token().clone()))
            .await;

        info!("Shutting down Boot Script Service");
        self.workers.shutdown().await;
        served?;
        Ok(())
    }
}

/// Resolves on SIGINT, SIGTERM or cancellation of `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
        () = token.cancelled() => {}
    }
}
