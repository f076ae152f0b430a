//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use contaai_core::db::Database;
use contaai_core::test_utils::MockAnalysisServer;
use contaai_core::{AnalysisClient, AnalysisConfig};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn setup_test_app() -> Router {
    let db = Database::in_memory().unwrap();
    create_router_with_analysis(db, None, ServerConfig::default(), None)
}

fn setup_test_app_with_analysis(analysis: AnalysisClient) -> Router {
    let db = Database::in_memory().unwrap();
    create_router_with_analysis(db, None, ServerConfig::default(), Some(analysis))
}

fn analysis_client(url: String) -> AnalysisClient {
    AnalysisClient::new(AnalysisConfig {
        url,
        api_key: None,
        timeout_secs: 5,
    })
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Register a user with a company and return the session token
async fn register_with_company(app: &Router, email: &str, cui: &str) -> String {
    let body = serde_json::json!({
        "email": email,
        "password": "parola-sigura",
        "firstName": "Ana",
        "lastName": "Pop",
        "companyData": {
            "name": "ACME SRL",
            "cui": cui,
            "regCom": "J40/1/2024",
            "address": "Str. Unirii 1, Bucuresti"
        }
    });
    let response = app
        .clone()
        .oneshot(request("POST", "/api/auth/register", None, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    json["token"].as_str().unwrap().to_string()
}

async fn create_client_via_api(app: &Router, token: &str, name: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/invoices/clients",
            Some(token),
            Some(serde_json::json!({ "name": name })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await["id"].as_i64().unwrap()
}

async fn create_invoice_via_api(
    app: &Router,
    token: &str,
    client_id: i64,
    total: &str,
    status: &str,
    issue_date: &str,
) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/invoices",
            Some(token),
            Some(serde_json::json!({
                "clientId": client_id,
                "total": total,
                "status": status,
                "issueDate": issue_date,
                "dueDate": "2024-03-20"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await
}

async fn import_statement_via_api(app: &Router, token: &str, csv: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/banking/statements/import",
            Some(token),
            Some(serde_json::json!({
                "fileName": "extras-martie.csv",
                "bankName": "Banca Transilvania",
                "periodStart": "2024-03-01",
                "periodEnd": "2024-03-31",
                "csvData": csv
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await
}

// ========== Auth ==========

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_test_app();
    let response = app
        .oneshot(request("GET", "/api/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "OK");
}

#[tokio::test]
async fn test_auth_required() {
    let app = setup_test_app();
    let response = app
        .oneshot(request("GET", "/api/documents", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let app = setup_test_app();
    let response = app
        .oneshot(request("GET", "/api/documents", Some("not-a-jwt"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_me_flow() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    // /me sees both the user and the company
    let response = app
        .clone()
        .oneshot(request("GET", "/api/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = get_body_json(response).await;
    assert_eq!(me["user"]["email"], "ana@acme.ro");
    assert_eq!(me["company"]["name"], "ACME SRL");

    // A fresh login works and yields a usable token
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({
                "email": "ana@acme.ro",
                "password": "parola-sigura"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login = get_body_json(response).await;
    assert!(login["token"].as_str().is_some());

    // Wrong password is a 401
    let response = app
        .oneshot(request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({
                "email": "ana@acme.ro",
                "password": "gresita-total"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = setup_test_app();
    register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "email": "ana@acme.ro",
                "password": "alta-parola-1",
                "firstName": "Ana",
                "lastName": "Pop"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_company_scope_required() {
    let app = setup_test_app();

    // Register without company data: the multi-step flow
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "email": "ana@acme.ro",
                "password": "parola-sigura",
                "firstName": "Ana",
                "lastName": "Pop"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = get_body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Company data is off-limits until setup completes
    let response = app
        .clone()
        .oneshot(request("GET", "/api/documents", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Finish setup
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/setup-company",
            Some(&token),
            Some(serde_json::json!({
                "name": "ACME SRL",
                "cui": "RO100",
                "regCom": "J40/1/2024",
                "address": "Str. Unirii 1"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The same token now reaches company data
    let response = app
        .oneshot(request("GET", "/api/documents", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ========== Documents ==========

#[tokio::test]
async fn test_document_crud() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "factura.pdf",
                "fileType": "application/pdf",
                "fileData": "ZmFrZSBwZGY="
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = get_body_json(response).await;
    assert_eq!(doc["status"], "processing");
    let doc_id = doc["id"].as_i64().unwrap();

    // Same payload again is a duplicate
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "factura-copy.pdf",
                "fileData": "ZmFrZSBwZGY="
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Update, then delete
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/documents/{}", doc_id),
            Some(&token),
            Some(serde_json::json!({ "category": "Achizitii" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["category"], "Achizitii");

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/documents/{}", doc_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/api/documents", Some(&token), None))
        .await
        .unwrap();
    let docs = get_body_json(response).await;
    assert_eq!(docs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_process_document_generates_transaction() {
    let mut server = MockAnalysisServer::start().await;
    let app = setup_test_app_with_analysis(analysis_client(server.url()));
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "factura.pdf",
                "fileData": "ZmFrZSBwZGY="
            })),
        ))
        .await
        .unwrap();
    let doc_id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/documents/{}/process", doc_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = get_body_json(response).await;
    assert_eq!(doc["status"], "completed");
    assert_eq!(doc["supplier"], "Furnizor SRL");
    assert_eq!(doc["invoiceNumber"], "INV-0042");

    let response = app
        .oneshot(request(
            "GET",
            "/api/documents/transactions",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let txs = get_body_json(response).await;
    let txs = txs.as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["kind"], "income");
    assert_eq!(txs[0]["amount"], "1200.00");
    assert_eq!(txs[0]["date"], "2024-03-05");

    server.stop();
}

#[tokio::test]
async fn test_failed_analysis_leaves_error_status() {
    let mut server = MockAnalysisServer::start_failing().await;
    let app = setup_test_app_with_analysis(analysis_client(server.url()));
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "factura.pdf",
                "fileData": "ZmFrZSBwZGY="
            })),
        ))
        .await
        .unwrap();
    let doc_id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/documents/{}/process", doc_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Document ends in `error`, never stuck in `processing`
    let response = app
        .oneshot(request("GET", "/api/documents", Some(&token), None))
        .await
        .unwrap();
    let docs = get_body_json(response).await;
    assert_eq!(docs[0]["status"], "error");

    server.stop();
}

// ========== Invoices ==========

#[tokio::test]
async fn test_invoice_numbering_via_api() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;
    let client_id = create_client_via_api(&app, &token, "ACME Client SRL").await;

    let first = create_invoice_via_api(&app, &token, client_id, "150.50", "sent", "2024-03-01").await;
    let second = create_invoice_via_api(&app, &token, client_id, "49.50", "draft", "2024-03-02").await;
    assert_eq!(first["number"], "INV-0001");
    assert_eq!(second["number"], "INV-0002");

    // Client's running total follows
    let response = app
        .oneshot(request("GET", "/api/invoices/clients", Some(&token), None))
        .await
        .unwrap();
    let clients = get_body_json(response).await;
    assert_eq!(clients[0]["totalInvoiced"], "200.00");
}

#[tokio::test]
async fn test_invoice_unknown_client() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/invoices",
            Some(&token),
            Some(serde_json::json!({ "clientId": 999, "total": "10.00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Products ==========

#[tokio::test]
async fn test_product_crud_and_validation() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({
                "name": "Laptop",
                "sku": "LPT-01",
                "unitPrice": "3500.00",
                "stock": 3,
                "minStock": 5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let product = get_body_json(response).await;
    let product_id = product["id"].as_i64().unwrap();
    assert_eq!(product["unit"], "buc");

    // Negative stock rejected
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({
                "name": "Mouse",
                "sku": "MSE-01",
                "unitPrice": "50.00",
                "stock": -1
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/products/{}", product_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ========== Banking ==========

#[tokio::test]
async fn test_statement_import_and_listing() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let csv = "Date,Description,Amount,Balance,Counterparty,IBAN\n\
               05.03.2024,INV-0001 payment,1200.00,5200.00,ACME Client SRL,RO49AAAA1B31007593840000\n\
               06.03.2024,Chirie sediu,-800.00,4400.00,Landlord SA,";
    let import = import_statement_via_api(&app, &token, csv).await;
    assert_eq!(import["imported"], 2);
    assert_eq!(import["statement"]["status"], "completed");
    assert_eq!(import["statement"]["totalTransactions"], 2);

    let response = app
        .oneshot(request("GET", "/api/banking/transactions", Some(&token), None))
        .await
        .unwrap();
    let txs = get_body_json(response).await;
    let txs = txs.as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["kind"], "credit");
    assert_eq!(txs[1]["kind"], "debit");
}

#[tokio::test]
async fn test_statement_import_bad_csv() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/banking/statements/import",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "broken.csv",
                "csvData": "Date,Amount\n05.03.2024,10"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Reports ==========

#[tokio::test]
async fn test_report_financial_empty_company_has_no_nans() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request("GET", "/api/reports/financial", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = get_body_json(response).await;
    assert_eq!(report["financial"]["profitMargin"], "0.00");
    assert_eq!(report["invoices"]["collectionRate"], "0.00");
    assert_eq!(report["financial"]["netProfit"], "0");
}

#[tokio::test]
async fn test_report_financial_full_flow() {
    let mut server = MockAnalysisServer::start().await;
    let app = setup_test_app_with_analysis(analysis_client(server.url()));
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    // One analyzed document -> income 1200.00 on 2024-03-05
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token),
            Some(serde_json::json!({
                "fileName": "factura.pdf",
                "fileData": "ZmFrZSBwZGY="
            })),
        ))
        .await
        .unwrap();
    let doc_id = get_body_json(response).await["id"].as_i64().unwrap();
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/documents/{}/process", doc_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // One paid and one sent invoice
    let client_id = create_client_via_api(&app, &token, "ACME Client SRL").await;
    create_invoice_via_api(&app, &token, client_id, "600.00", "paid", "2024-03-02").await;
    create_invoice_via_api(&app, &token, client_id, "400.00", "sent", "2024-03-03").await;

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/reports/financial?startDate=2024-03-01&endDate=2024-04-01",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = get_body_json(response).await;

    assert_eq!(report["financial"]["totalIncome"], "1200.00");
    assert_eq!(report["financial"]["totalExpenses"], "0");
    assert_eq!(report["financial"]["netProfit"], "1200.00");
    assert_eq!(report["financial"]["profitMargin"], "100.00");
    assert_eq!(report["invoices"]["total"], 2);
    assert_eq!(report["invoices"]["paid"], 1);
    assert_eq!(report["invoices"]["collectionRate"], "60.00");

    // The report is a pure function of its inputs: ask again, get the same
    let response = app
        .oneshot(request(
            "GET",
            "/api/reports/financial?startDate=2024-03-01&endDate=2024-04-01",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let second = get_body_json(response).await;
    assert_eq!(report, second);

    server.stop();
}

#[tokio::test]
async fn test_report_invalid_date() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request(
            "GET",
            "/api/reports/financial?startDate=yesterday",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_report_dashboard_summary() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let client_id = create_client_via_api(&app, &token, "ACME Client SRL").await;
    create_invoice_via_api(&app, &token, client_id, "100.00", "paid", "2024-03-01").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({
                "name": "Toner",
                "sku": "TNR-01",
                "unitPrice": "90.00",
                "stock": 2,
                "minStock": 5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("GET", "/api/reports/dashboard", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = get_body_json(response).await;
    assert_eq!(dashboard["summary"]["totalInvoices"], 1);
    assert_eq!(dashboard["summary"]["paidInvoices"], 1);
    assert_eq!(dashboard["summary"]["totalProducts"], 1);
    assert_eq!(dashboard["summary"]["lowStockProducts"], 1);
    assert_eq!(dashboard["invoices"].as_array().unwrap().len(), 1);
}

// ========== Reconciliation ==========

#[tokio::test]
async fn test_reconciliation_exact_match() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let client_id = create_client_via_api(&app, &token, "ACME Client SRL").await;
    let invoice =
        create_invoice_via_api(&app, &token, client_id, "1200.00", "sent", "2024-03-04").await;
    assert_eq!(invoice["number"], "INV-0001");

    let csv = "Date,Description,Amount\n05.03.2024,INV-0001 payment,1200.00\n";
    let import = import_statement_via_api(&app, &token, csv).await;
    let statement_id = import["statement"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/reconciliation/statements/{}/run", statement_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let run = get_body_json(response).await;
    assert_eq!(run["matched"], 1);
    assert_eq!(run["unmatched"], 0);

    let rec = &run["reconciliations"][0];
    assert_eq!(rec["matchType"], "exact");
    assert_eq!(rec["confidence"], 1.0);
    assert_eq!(rec["status"], "matched");
    assert_eq!(rec["matchedKind"], "invoice");
    assert_eq!(rec["matchedId"], invoice["id"]);
}

#[tokio::test]
async fn test_manual_reconciliation_survives_rerun() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let client_id = create_client_via_api(&app, &token, "ACME Client SRL").await;
    create_invoice_via_api(&app, &token, client_id, "1200.00", "sent", "2024-03-04").await;
    let preferred =
        create_invoice_via_api(&app, &token, client_id, "1200.00", "sent", "2024-03-01").await;

    let csv = "Date,Description,Amount\n05.03.2024,Incasare client,1200.00\n";
    let import = import_statement_via_api(&app, &token, csv).await;
    let statement_id = import["statement"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(request("GET", "/api/banking/transactions", Some(&token), None))
        .await
        .unwrap();
    let bank_tx_id = get_body_json(response).await[0]["id"].as_i64().unwrap();

    // Operator pins the line to the second invoice
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/reconciliation/manual",
            Some(&token),
            Some(serde_json::json!({
                "bankTransactionId": bank_tx_id,
                "matchedKind": "invoice",
                "matchedId": preferred["id"]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let manual = get_body_json(response).await;
    assert_eq!(manual["matchType"], "manual");
    assert_eq!(manual["confidence"], 1.0);

    // The automatic run leaves the manual decision in place
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/reconciliation/statements/{}/run", statement_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/reconciliation/statements/{}", statement_id),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let recs = get_body_json(response).await;
    let recs = recs.as_array().unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["matchType"], "manual");
    assert_eq!(recs[0]["matchedId"], preferred["id"]);
}

#[tokio::test]
async fn test_reconciliation_unknown_statement() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/reconciliation/statements/999/run",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Tenant isolation ==========

#[tokio::test]
async fn test_cross_company_access_is_not_found() {
    let app = setup_test_app();
    let token_a = register_with_company(&app, "a@acme.ro", "RO100").await;
    let token_b = register_with_company(&app, "b@other.ro", "RO200").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/documents",
            Some(&token_a),
            Some(serde_json::json!({ "fileName": "secret.pdf" })),
        ))
        .await
        .unwrap();
    let doc_id = get_body_json(response).await["id"].as_i64().unwrap();

    // Company B cannot see, update or delete company A's document
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/documents/{}", doc_id),
            Some(&token_b),
            Some(serde_json::json!({ "category": "stolen" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/documents/{}", doc_id),
            Some(&token_b),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("GET", "/api/documents", Some(&token_b), None))
        .await
        .unwrap();
    let docs = get_body_json(response).await;
    assert_eq!(docs.as_array().unwrap().len(), 0);
}

// ========== Settings ==========

#[tokio::test]
async fn test_company_settings_roundtrip() {
    let app = setup_test_app();
    let token = register_with_company(&app, "ana@acme.ro", "RO100").await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/settings/company", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let company = get_body_json(response).await;
    assert_eq!(company["name"], "ACME SRL");

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/settings/company",
            Some(&token),
            Some(serde_json::json!({
                "name": "ACME Group SRL",
                "cui": "RO100",
                "regCom": "J40/1/2024",
                "address": "Str. Unirii 1",
                "invoicePrefix": "ACM"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = get_body_json(response).await;
    assert_eq!(updated["name"], "ACME Group SRL");
    assert_eq!(updated["invoicePrefix"], "ACM");
}
