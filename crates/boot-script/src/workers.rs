//! Background worker lifecycle
//!
//! Owns the cache sweeper and the optional synchronizer task. Both share one
//! cancellation token and are joined on shutdown.

use crate::cache::ScriptCache;
use crate::sync::NodeSynchronizer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug)]
pub struct BackgroundWorkers {
    token: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundWorkers {
    /// Spawn the sweeper, and the synchronizer when one is given
    pub fn spawn(
        cache: Arc<ScriptCache>,
        synchronizer: Option<Arc<NodeSynchronizer>>,
        token: CancellationToken,
    ) -> Self {
        let mut handles = vec![("cache-sweeper", tokio::spawn(cache.run_sweeper(token.clone())))];
        if let Some(synchronizer) = synchronizer {
            handles.push(("node-sync", tokio::spawn(synchronizer.run(token.clone()))));
        }
        info!("Started {} background workers", handles.len());
        Self { token, handles }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel all workers and wait for them to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!("Background worker {} failed: {}", name, e);
            }
        }
        info!("Background workers stopped");
    }
}
