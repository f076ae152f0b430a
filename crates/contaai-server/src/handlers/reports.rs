//! Report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthContext};
use contaai_core::models::{
    BankStatement, Contract, DashboardSummary, Document, FinancialReport, Invoice, Product,
    Transaction,
};
use contaai_core::report::{compute_dashboard, compute_report, CompanySnapshot, DateRange};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReportQuery {
    /// Inclusive range start (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// Exclusive range end (YYYY-MM-DD)
    pub end_date: Option<String>,
}

/// GET /api/reports/financial - Period financial report
pub async fn report_financial(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<FinancialReportQuery>,
) -> Result<Json<FinancialReport>, AppError> {
    let company_id = auth.company_scope()?;

    let start = parse_report_date(params.start_date.as_deref())?;
    let end = parse_report_date(params.end_date.as_deref())?;
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(AppError::bad_request("endDate must not precede startDate"));
        }
    }
    let range = DateRange::new(start, end);

    let snapshot = CompanySnapshot::load(&state.db, company_id)?;
    let report = compute_report(&snapshot, &range);

    state.db.log_audit(
        &auth.email,
        "report",
        Some("financial"),
        None,
        Some(&format!(
            "start={:?}, end={:?}, transactions={}",
            start,
            end,
            snapshot.transactions.len()
        )),
    )?;

    Ok(Json(report))
}

/// Dashboard payload: full entity lists plus summary counts
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub documents: Vec<Document>,
    pub contracts: Vec<Contract>,
    pub invoices: Vec<Invoice>,
    pub products: Vec<Product>,
    pub bank_statements: Vec<BankStatement>,
    pub transactions: Vec<Transaction>,
    pub summary: DashboardSummary,
}

/// GET /api/reports/dashboard - Dashboard data
pub async fn report_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardResponse>, AppError> {
    let company_id = auth.company_scope()?;

    let snapshot = CompanySnapshot::load(&state.db, company_id)?;
    let summary = compute_dashboard(&snapshot);

    state.db.log_audit(&auth.email, "report", Some("dashboard"), None, None)?;

    Ok(Json(DashboardResponse {
        documents: snapshot.documents,
        contracts: snapshot.contracts,
        invoices: snapshot.invoices,
        products: snapshot.products,
        bank_statements: snapshot.statements,
        transactions: snapshot.transactions,
        summary,
    }))
}

fn parse_report_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    raw.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid date format (use YYYY-MM-DD)"))
}
