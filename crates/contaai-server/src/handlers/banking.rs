//! Banking handlers: statements, statement import, transaction listing

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, AuthContext};
use contaai_core::models::{BankStatement, BankTransaction, NewBankStatement};
use contaai_core::normalize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRequest {
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    #[serde(default)]
    pub opening_balance: Decimal,
    #[serde(default)]
    pub closing_balance: Decimal,
}

impl StatementRequest {
    fn into_new_statement(self) -> NewBankStatement {
        NewBankStatement {
            file_name: self.file_name,
            file_size: self.file_size,
            bank_name: self.bank_name,
            account_number: self.account_number,
            period_start: self.period_start,
            period_end: self.period_end,
            opening_balance: self.opening_balance,
            closing_balance: self.closing_balance,
        }
    }
}

/// GET /api/banking/statements - List the company's statements
pub async fn list_statements(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<BankStatement>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_statements(company_id)?))
}

/// POST /api/banking/statements - Create a statement shell
pub async fn create_statement(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<StatementRequest>,
) -> Result<Json<BankStatement>, AppError> {
    let company_id = auth.company_scope()?;

    if body.file_name.trim().is_empty() {
        return Err(AppError::bad_request("fileName is required"));
    }

    let id = state
        .db
        .create_statement(company_id, &body.into_new_statement())?;
    let statement = state
        .db
        .get_statement(company_id, id)?
        .ok_or_else(|| AppError::internal("Statement vanished after creation"))?;
    Ok(Json(statement))
}

/// PUT /api/banking/statements/:id - Update statement header fields
pub async fn update_statement(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<StatementRequest>,
) -> Result<Json<BankStatement>, AppError> {
    let company_id = auth.company_scope()?;

    let statement = state
        .db
        .update_statement(company_id, id, &body.into_new_statement(), None)?
        .ok_or_else(|| AppError::not_found("Bank statement not found"))?;
    Ok(Json(statement))
}

/// Import request: statement header plus raw CSV text
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatementRequest {
    #[serde(flatten)]
    pub statement: StatementRequest,
    /// CSV content: `Date,Description,Amount[,Balance][,Counterparty][,IBAN]`
    pub csv_data: String,
}

#[derive(Serialize)]
pub struct ImportStatementResponse {
    pub statement: BankStatement,
    pub imported: usize,
}

/// POST /api/banking/statements/import - Create a statement from CSV lines
pub async fn import_statement(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ImportStatementRequest>,
) -> Result<Json<ImportStatementResponse>, AppError> {
    let company_id = auth.company_scope()?;

    if body.statement.file_name.trim().is_empty() {
        return Err(AppError::bad_request("fileName is required"));
    }

    let lines = normalize::parse_statement_csv(body.csv_data.as_bytes())
        .map_err(|e| AppError::bad_request(&format!("Invalid statement CSV: {}", e)))?;

    let statement_id = state
        .db
        .create_statement(company_id, &body.statement.into_new_statement())?;
    let imported = state
        .db
        .insert_bank_transactions(company_id, statement_id, &lines)?;

    info!(
        user = %auth.email,
        statement_id,
        imported,
        "Bank statement imported"
    );
    state.db.log_audit(
        &auth.email,
        "import_statement",
        Some("bank_statement"),
        Some(statement_id),
        Some(&format!("lines={}", imported)),
    )?;

    let statement = state
        .db
        .get_statement(company_id, statement_id)?
        .ok_or_else(|| AppError::internal("Statement vanished after import"))?;

    Ok(Json(ImportStatementResponse {
        statement,
        imported,
    }))
}

/// GET /api/banking/transactions - Every bank transaction across statements
pub async fn list_bank_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<BankTransaction>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_all_bank_transactions(company_id)?))
}
