//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router; every path goes to the upgrade handler
//! - Answer accepted handshakes with 101 and the protocol's accept header
//! - Hand the upgraded connection to the winning handler once hyper
//!   releases it
//! - Answer everything else with an empty 404
//!
//! # Design Decisions
//! - Rejections are indistinguishable on the wire: same status, no body
//! - The 101 response is returned before the upgrade completes; the
//!   hand-off runs on its own task

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode, Version},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::handoff::HandoffOutcome;
use crate::registry::{Dispatch, UpgradeDispatchTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<UpgradeDispatchTable>,
    pub listener: Arc<str>,
}

/// HTTP listener hosting an upgrade dispatch table.
pub struct HttpServer {
    router: Router,
    listener: Arc<str>,
}

impl HttpServer {
    pub fn new(listener: impl Into<Arc<str>>, dispatch: Arc<UpgradeDispatchTable>) -> Self {
        let listener = listener.into();
        let state = AppState {
            dispatch,
            listener: Arc::clone(&listener),
        };
        Self {
            router: Self::build_router(state),
            listener,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(upgrade_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Router for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, listener = %self.listener, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(listener = %self.listener, "HTTP server stopped");
        Ok(())
    }
}

fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// Route the request through the dispatch table and complete the upgrade.
async fn upgrade_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    // Connection upgrades exist only in HTTP/1.1.
    if request.version() != Version::HTTP_11 {
        return not_found();
    }
    let (handler, acceptance, ticket) = match state.dispatch.dispatch(request.headers()) {
        Dispatch::Accepted {
            handler,
            acceptance,
            ticket,
        } => (handler, acceptance, ticket),
        Dispatch::NotUpgrade => return not_found(),
        Dispatch::UnknownProtocol(protocol) => {
            tracing::debug!(listener = %state.listener, upgrade = %protocol, "Unknown upgrade protocol");
            return not_found();
        }
        Dispatch::Rejected { protocol, rejection } => {
            tracing::debug!(listener = %state.listener, protocol = %protocol, reason = rejection.label(), "Upgrade rejected");
            return not_found();
        }
    };

    let registration = Arc::clone(handler.registration());
    let (Ok(upgrade), Ok(accept)) = (
        HeaderValue::from_str(registration.protocol()),
        HeaderValue::from_str(&acceptance.accept_token),
    ) else {
        tracing::error!(protocol = %registration.protocol(), "Unencodable upgrade response header");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, upgrade);
    headers.insert(registration.accept_header().clone(), accept);

    let on_upgrade = hyper::upgrade::on(&mut request);
    let listener = Arc::clone(&state.listener);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                if let HandoffOutcome::Transferred {
                    connection_id,
                    broker,
                    acceptor,
                } = handler.on_upgraded(ticket, TokioIo::new(upgraded))
                {
                    tracing::debug!(
                        listener = %listener,
                        connection = %connection_id,
                        broker = %broker,
                        acceptor = %acceptor,
                        "Upgraded connection handed off"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(listener = %listener, error = %e, "HTTP upgrade failed");
            }
        }
    });

    tracing::debug!(
        listener = %state.listener,
        protocol = %registration.protocol(),
        broker = %acceptance.broker,
        acceptor = %acceptance.acceptor,
        "Switching protocols"
    );
    response
}
