//! ContaAI Web Server
//!
//! Axum-based REST API for the ContaAI accounting back-office.
//!
//! Security features:
//! - JWT session authentication (register/login issue tokens)
//! - Company scoping on every business route: a token without a company
//!   cannot touch company data, and no query crosses company boundaries
//! - Restrictive CORS policy and security headers
//! - Full audit logging for reports and reconciliation runs
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use contaai_core::analysis::AnalysisClient;
use contaai_core::db::Database;

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Environment variable holding the JWT signing secret
pub const JWT_SECRET_ENV: &str = "CONTAAI_JWT_SECRET";

/// Routes reachable without a session token
const PUBLIC_PATHS: &[&str] = &["/api/health", "/api/auth/register", "/api/auth/login"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Token lifetime in days
    pub token_ttl_days: i64,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Read configuration from the environment
    pub fn from_env() -> Self {
        let jwt_secret = match std::env::var(JWT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!(
                    "{} not set - using an insecure development secret, do not expose to a network",
                    JWT_SECRET_ENV
                );
                "contaai-dev-secret".to_string()
            }
        };
        Self {
            jwt_secret,
            ..Default::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "contaai-dev-secret".to_string(),
            token_ttl_days: 7,
            allowed_origins: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// External document-analysis collaborator, when configured
    pub analysis: Option<AnalysisClient>,
}

/// JWT claims carried in a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    /// Company scope; None until the user completes company setup
    pub company_id: Option<i64>,
    pub exp: i64,
}

/// Per-request session context, injected by the auth middleware.
///
/// This is the process-wide session state made explicit: handlers receive
/// it by reference instead of consulting ambient globals.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub company_id: Option<i64>,
}

impl AuthContext {
    /// The company scope, or a 403: operating on company data without a
    /// company id would break tenant isolation, so it is a hard failure.
    pub fn company_scope(&self) -> Result<i64, AppError> {
        self.company_id
            .ok_or_else(|| AppError::forbidden("Company setup required"))
    }
}

/// Issue a session token for a user
pub fn issue_token(config: &ServerConfig, user: &contaai_core::models::User) -> Result<String, AppError> {
    let exp = chrono::Utc::now() + chrono::Duration::days(config.token_ttl_days);
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        company_id: user.company_id,
        exp: exp.timestamp(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("Failed to issue token: {}", e)))
}

/// Authentication middleware - validates the Bearer session token and
/// injects the session context into the request.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token,
        None => {
            warn!(path = %path, "Unauthorized request - missing token");
            return unauthorized_response();
        }
    };

    let decoded = jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    );

    let claims = match decoded {
        Ok(data) => data.claims,
        Err(e) => {
            warn!(path = %path, error = %e, "Unauthorized request - invalid token");
            return unauthorized_response();
        }
    };

    // Re-read the user so a company created after login is visible to the
    // same token without re-authenticating.
    match state.db.get_user(claims.sub) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthContext {
                user_id: user.id,
                email: user.email,
                company_id: user.company_id,
            });
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %path, user_id = claims.sub, "Token for unknown user");
            unauthorized_response()
        }
        Err(e) => {
            error!(path = %path, error = %e, "User lookup failed during auth");
            AppError::internal("An internal error occurred").into_response()
        }
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let analysis = AnalysisClient::from_env();
    match &analysis {
        Some(client) => info!("Analysis service configured: {}", client.host()),
        None => info!(
            "Analysis service not configured (set {} to enable document analysis)",
            contaai_core::analysis::ANALYSIS_URL_ENV
        ),
    }

    create_router_with_analysis(db, static_dir, config, analysis)
}

/// Create the application router with an explicit analysis client (for testing)
pub fn create_router_with_analysis(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    analysis: Option<AnalysisClient>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        analysis,
    });

    let api_routes = Router::new()
        // Health
        .route("/health", get(health))
        // Auth
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/setup-company", post(handlers::setup_company))
        // Documents
        .route(
            "/documents",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route("/documents/transactions", get(handlers::list_transactions))
        .route(
            "/documents/:id",
            put(handlers::update_document).delete(handlers::delete_document),
        )
        .route("/documents/:id/process", post(handlers::process_document))
        // Contracts
        .route(
            "/contracts",
            get(handlers::list_contracts).post(handlers::create_contract),
        )
        .route(
            "/contracts/:id",
            put(handlers::update_contract).delete(handlers::delete_contract),
        )
        // Invoices and clients
        .route(
            "/invoices",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route(
            "/invoices/clients",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route("/invoices/:id", put(handlers::update_invoice))
        // Products
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/:id",
            put(handlers::update_product).delete(handlers::delete_product),
        )
        // Banking
        .route(
            "/banking/statements",
            get(handlers::list_statements).post(handlers::create_statement),
        )
        .route(
            "/banking/statements/import",
            post(handlers::import_statement),
        )
        .route("/banking/statements/:id", put(handlers::update_statement))
        .route(
            "/banking/transactions",
            get(handlers::list_bank_transactions),
        )
        // Reports
        .route("/reports/financial", get(handlers::report_financial))
        .route("/reports/dashboard", get(handlers::report_dashboard))
        // Reconciliation
        .route(
            "/reconciliation/statements/:id/run",
            post(handlers::run_reconciliation),
        )
        .route(
            "/reconciliation/statements/:id",
            get(handlers::list_reconciliations),
        )
        .route(
            "/reconciliation/manual",
            post(handlers::manual_reconciliation),
        )
        // Settings
        .route(
            "/settings/company",
            get(handlers::get_company_settings).put(handlers::update_company_settings),
        );

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: restrict scripts to same-origin, allow inline styles, blob: images
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'",
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_analysis_connection().await;

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log analysis service connection status
async fn check_analysis_connection() {
    match AnalysisClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!("Analysis service connected: {}", client.host());
            } else {
                warn!(
                    "Analysis service configured but not responding: {}",
                    client.host()
                );
            }
        }
        None => {
            info!(
                "Analysis service not configured (set {} to enable document analysis)",
                contaai_core::analysis::ANALYSIS_URL_ENV
            );
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
