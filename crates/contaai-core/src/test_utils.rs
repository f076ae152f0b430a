//! Test utilities for contaai-core
//!
//! Provides a mock document-analysis server so integration tests can
//! exercise the document pipeline without the real external service.

use axum::http::StatusCode;
use axum::{
    extract::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Mock analysis server for testing and development
pub struct MockAnalysisServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAnalysisServer {
    /// Start a mock that returns a canned successful analysis
    pub async fn start() -> Self {
        Self::start_with(Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/analyze", post(handle_analyze)))
        .await
    }

    /// Start a mock whose analyze endpoint always fails with 500
    pub async fn start_failing() -> Self {
        Self::start_with(
            Router::new()
                .route("/health", get(|| async { "ok" }))
                .route(
                    "/analyze",
                    post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
                ),
        )
        .await
    }

    async fn start_with(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAnalysisServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Canned analysis: a services invoice with a Romanian-formatted amount
async fn handle_analyze(Json(request): Json<Value>) -> Json<Value> {
    let file_name = request
        .get("fileName")
        .and_then(|v| v.as_str())
        .unwrap_or("document.pdf");

    Json(json!({
        "description": format!("Factura servicii ({})", file_name),
        "amount": "1.200,00 RON",
        "category": "Servicii IT",
        "supplier": "Furnizor SRL",
        "client": "ACME Client SRL",
        "documentDate": "05.03.2024",
        "invoiceNumber": "INV-0042",
        "cui": "RO12345678",
        "confidence": 0.93,
        "insights": ["Platit prin transfer bancar"],
        "recommendations": ["Verificati termenul de plata"]
    }))
}
