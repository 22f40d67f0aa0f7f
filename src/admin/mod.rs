//! Admin introspection API.
//!
//! # Responsibilities
//! - Report bridge status, listener upgrade metadata and broker topology
//! - Guard every route with a bearer API key
//!
//! # Design Decisions
//! - Runs on its own listener so it is never reachable through the
//!   upgrade endpoint
//! - Read-only: nothing here mutates bridges or topology

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::directory::BrokerDirectory;
use crate::registry::{ListenerMetadataRegistry, UpgradeDispatchTable};

use self::auth::admin_auth_middleware;
use self::handlers::{get_brokers, get_status, get_upgrades};

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub listener: Arc<str>,
    pub api_key: Arc<str>,
    pub directory: Arc<BrokerDirectory>,
    pub dispatch: Arc<UpgradeDispatchTable>,
    pub metadata: Arc<ListenerMetadataRegistry>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/upgrades", get(get_upgrades))
        .route("/admin/brokers", get(get_brokers))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::lifecycle::BridgeRuntime;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> (BridgeRuntime, Router) {
        let config = parse_config(
            r#"
            [listener]
            name = "http"

            [[brokers]]
            name = "default"

            [[brokers.acceptors]]
            name = "http-acceptor"
            forward_address = "127.0.0.1:61616"

            [[brokers.backups]]
            name = "backup1"
            active = false

            [[bridges]]
            broker = "default"
            acceptor = "http-acceptor"
            legacy = true
            "#,
        )
        .unwrap();
        let runtime = BridgeRuntime::start(&config).unwrap();
        let state = AdminState {
            listener: Arc::from("http"),
            api_key: Arc::from("secret"),
            directory: runtime.directory.clone(),
            dispatch: runtime.dispatch.clone(),
            metadata: runtime.metadata.clone(),
        };
        (runtime, setup_admin_router(state))
    }

    async fn get_json(router: Router, path: &str, key: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(path);
        if let Some(key) = key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = router.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let (_runtime, router) = router();
        let (status, _) = get_json(router.clone(), "/admin/status", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = get_json(router, "/admin/status", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_counts_registrations() {
        let (_runtime, router) = router();
        let (status, body) = get_json(router, "/admin/status", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listener"], "http");
        assert_eq!(body["registrations"], 2);
        assert_eq!(body["status"], "operational");
    }

    #[tokio::test]
    async fn upgrades_lists_listener_metadata() {
        let (_runtime, router) = router();
        let (_, body) = get_json(router, "/admin/upgrades", Some("secret")).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .any(|e| e["protocol"] == "hornetq-remoting" && e["mechanism"] == "core"));
    }

    #[tokio::test]
    async fn brokers_reports_topology() {
        let (_runtime, router) = router();
        let (_, body) = get_json(router, "/admin/brokers", Some("secret")).await;
        let root = &body[0];
        assert_eq!(root["name"], "default");
        assert_eq!(root["active"], true);
        assert_eq!(root["acceptors"][0]["name"], "http-acceptor");
        assert_eq!(root["backups"][0]["name"], "backup1");
        assert_eq!(root["backups"][0]["active"], false);
    }
}
