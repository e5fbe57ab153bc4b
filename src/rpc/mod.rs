pub mod handlers;
pub mod types;

use axum::{routing::post, Router};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::account::auth::SessionManager;
use crate::ledger::Ledger;
use crate::platform::PlatformConfig;
use crate::support::{Classifier, SupportDesk};

#[derive(Clone)]
pub struct RpcState {
    pub ledger: Arc<Mutex<Ledger>>,
    pub sessions: Arc<Mutex<SessionManager>>,
    pub support: Arc<Mutex<SupportDesk>>,
    pub platform: Arc<Mutex<PlatformConfig>>,
    pub classifier: Arc<dyn Classifier>,
}

pub struct RpcServer {
    state: RpcState,
    bind_addr: String,
}

impl RpcServer {
    pub fn new(
        ledger: Arc<Mutex<Ledger>>,
        sessions: Arc<Mutex<SessionManager>>,
        support: Arc<Mutex<SupportDesk>>,
        platform: Arc<Mutex<PlatformConfig>>,
        classifier: Arc<dyn Classifier>,
        port: u16,
    ) -> Self {
        Self {
            state: RpcState {
                ledger,
                sessions,
                support,
                platform,
                classifier,
            },
            bind_addr: format!("0.0.0.0:{}", port),
        }
    }

    pub async fn start(self) {
        let app = Router::new()
            .route("/", post(handlers::handle_rpc_request))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .expect("Failed to bind RPC server");

        info!("RPC server listening on {}", self.bind_addr);
        axum::serve(listener, app).await.expect("RPC server failed");
    }
}
