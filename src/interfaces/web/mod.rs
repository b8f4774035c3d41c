pub(crate) mod auth;
mod handlers;
mod router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::core::automation::AutomationOrchestrator;
use crate::core::lifecycle::LifecycleComponent;
use crate::core::processors::JobProcessors;
use crate::core::store::Store;


#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: Arc<AutomationOrchestrator>,
    pub(crate) processors: Arc<JobProcessors>,
    pub(crate) store: Store,
    pub(crate) log_tx: broadcast::Sender<String>,
    pub(crate) api_host: String,
    pub(crate) api_port: u16,
    pub(crate) admin_token: Option<String>,
}

pub struct ApiServerConfig {
    pub orchestrator: Arc<AutomationOrchestrator>,
    pub processors: Arc<JobProcessors>,
    pub store: Store,
    pub log_tx: broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
    pub admin_token: Option<String>,
}

pub struct ApiServer {
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                orchestrator: config.orchestrator,
                processors: config.processors,
                store: config.store,
                log_tx: config.log_tx,
                api_host: config.api_host,
                api_port: config.api_port,
                admin_token: config.admin_token.filter(|t| !t.trim().is_empty()),
            },
            shutdown_tx: None,
            handle: None,
        }
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(log) => Ok(Event::default().data(log)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// --- Lifecycle Implementations ---

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.state.api_host, self.state.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;
        let app = router::build_api_router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        info!("API Server running at http://{addr}");
        self.handle = Some(tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}
