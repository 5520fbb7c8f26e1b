//! HTTP surface for iPXE clients.
//!
//! Routes:
//! - `GET /boot/v1/bootscript?mac=|name=|nid=|identifier=` returns the script
//!   as `text/plain`
//! - `GET /health` reports store and provider reachability
//! - `GET /stats` returns engine, cache and provider counters

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use boot_script::{BootError, BootScriptService};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
struct AppState {
    service: Arc<BootScriptService>,
}

/// Accepted identifier parameters, first non-empty one wins
#[derive(Debug, Default, Deserialize)]
struct BootScriptQuery {
    mac: Option<String>,
    name: Option<String>,
    nid: Option<String>,
    identifier: Option<String>,
}

impl BootScriptQuery {
    fn identifier(&self) -> Option<&str> {
        [&self.mac, &self.name, &self.nid, &self.identifier]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|v| !v.trim().is_empty())
    }
}

pub fn router(service: Arc<BootScriptService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/boot/v1/bootscript", get(boot_script))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout)),
        )
        .with_state(AppState { service })
}

async fn boot_script(State(state): State<AppState>, Query(query): Query<BootScriptQuery>) -> Response {
    let Some(identifier) = query.identifier() else {
        return (
            StatusCode::BAD_REQUEST,
            "one of mac, name, nid or identifier is required\n",
        )
            .into_response();
    };

    match state.service.generate_boot_script(identifier).await {
        Ok(script) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], script).into_response(),
        Err(BootError::Invalid(message)) => (StatusCode::BAD_REQUEST, format!("{message}\n")).into_response(),
        Err(e) => {
            error!("Boot script request for {} failed: {}", identifier, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let provider = state.service.provider_type();
    match state.service.health_check().await {
        Ok(()) => Json(json!({ "status": "healthy", "provider": provider })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "provider": provider, "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::Value::Object(state.service.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use boot_script::{
        BootConfiguration, InventoryComponent, MemoryNodeStore, Node, NodeProvider, NodeStore, ProviderError,
        ScriptCache, ScriptRenderer,
    };
    use tower::ServiceExt;

    /// Provider that answers long after any request deadline
    #[derive(Debug)]
    struct HangingProvider;

    #[async_trait::async_trait]
    impl NodeProvider for HangingProvider {
        fn provider_type(&self) -> &'static str {
            "hsm"
        }

        async fn get_by_identifier(&self, identifier: &str) -> Result<InventoryComponent, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::NotFound(identifier.to_string()))
        }

        async fn list_all(&self) -> Result<Vec<InventoryComponent>, ProviderError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        fn stats(&self) -> serde_json::Map<String, serde_json::Value> {
            serde_json::Map::new()
        }
    }

    async fn test_router() -> (Router, Arc<MemoryNodeStore>) {
        let store = Arc::new(MemoryNodeStore::with_boot_configurations(vec![BootConfiguration {
            name: "compute".to_string(),
            kernel: "http://boot.example.com/images/vmlinuz".to_string(),
            params: "console=ttyS0".to_string(),
            ..BootConfiguration::default()
        }]));
        store
            .add_node(Node {
                nid: Some(1),
                boot_mac: Some("a4:bf:01:00:00:01".to_string()),
                role: "Compute".to_string(),
                ..Node::new("x1000c0s0b0n0")
            })
            .await;
        let service = Arc::new(BootScriptService::new(
            Arc::clone(&store) as Arc<dyn NodeStore>,
            None,
            Arc::new(ScriptCache::new(Duration::from_secs(300))),
            ScriptRenderer::default(),
        ));
        (router(service, Duration::from_secs(5)), store)
    }

    async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_query_identifier_precedence() {
        let query = BootScriptQuery {
            mac: Some(String::new()),
            name: Some("x1000c0s0b0n0".to_string()),
            nid: Some("1".to_string()),
            identifier: None,
        };
        assert_eq!(query.identifier(), Some("x1000c0s0b0n0"));
        assert_eq!(BootScriptQuery::default().identifier(), None);
    }

    #[tokio::test]
    async fn test_boot_script_by_each_parameter() {
        let (router, _store) = test_router().await;
        for uri in [
            "/boot/v1/bootscript?mac=a4:bf:01:00:00:01",
            "/boot/v1/bootscript?name=x1000c0s0b0n0",
            "/boot/v1/bootscript?nid=1",
            "/boot/v1/bootscript?identifier=x1000c0s0b0n0",
        ] {
            let (status, body) = get_text(router.clone(), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body.starts_with("#!ipxe"), "{uri}: {body}");
            assert!(body.contains("kernel --name vmlinuz"), "{uri}: {body}");
        }
    }

    #[tokio::test]
    async fn test_unknown_node_still_gets_script() {
        let (router, _store) = test_router().await;
        let (status, body) = get_text(router, "/boot/v1/bootscript?name=x9999c9s9b9n9").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("#!ipxe"));
        assert!(!body.contains("kernel --name"));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (router, _store) = test_router().await;
        let (status, _) = get_text(router.clone(), "/boot/v1/bootscript").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_text(router, "/boot/v1/bootscript?name=x1000;reboot").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_and_stats() {
        let (router, store) = test_router().await;
        let (status, body) = get_text(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));

        let (status, body) = get_text(router.clone(), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(stats["provider_type"], "none");

        store.set_unavailable(true);
        let (status, body) = get_text(router, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("unhealthy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_still_gets_script() {
        let store = Arc::new(MemoryNodeStore::new());
        let service = BootScriptService::new(
            store as Arc<dyn NodeStore>,
            Some(Arc::new(HangingProvider) as Arc<dyn NodeProvider>),
            Arc::new(ScriptCache::new(Duration::from_secs(300))),
            ScriptRenderer::default(),
        )
        .with_provider_timeout(Duration::from_secs(10));
        let router = router(Arc::new(service), Duration::from_secs(30));

        let (status, body) = get_text(router, "/boot/v1/bootscript?name=x9999c9s9b9n9").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("#!ipxe"), "{body}");
        assert!(body.contains("chain --autofree"), "{body}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_deadline_is_408() {
        let store = Arc::new(MemoryNodeStore::new());
        let service = BootScriptService::new(
            store as Arc<dyn NodeStore>,
            Some(Arc::new(HangingProvider) as Arc<dyn NodeProvider>),
            Arc::new(ScriptCache::new(Duration::from_secs(300))),
            ScriptRenderer::default(),
        )
        .with_provider_timeout(Duration::from_secs(60));
        let router = router(Arc::new(service), Duration::from_secs(30));

        let (status, _) = get_text(router, "/boot/v1/bootscript?name=x9999c9s9b9n9").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
