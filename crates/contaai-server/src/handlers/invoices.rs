//! Invoice and client handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{AppError, AppState, AuthContext};
use contaai_core::models::{Client, Invoice, InvoiceStatus, NewInvoice};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: i64,
    pub total: Decimal,
    #[serde(default = "default_invoice_status")]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

fn default_invoice_status() -> InvoiceStatus {
    InvoiceStatus::Draft
}

/// GET /api/invoices - List the company's invoices
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_invoices(company_id)?))
}

/// POST /api/invoices - Create an invoice with a generated number
pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let company_id = auth.company_scope()?;

    if state.db.get_client(company_id, body.client_id)?.is_none() {
        return Err(AppError::not_found("Client not found"));
    }

    let invoice = state.db.create_invoice(
        company_id,
        &NewInvoice {
            client_id: body.client_id,
            total: body.total,
            status: body.status,
            issue_date: body.issue_date,
            due_date: body.due_date,
        },
    )?;
    Ok(Json(invoice))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// PUT /api/invoices/:id - Update invoice fields
pub async fn update_invoice(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let company_id = auth.company_scope()?;

    let invoice = state
        .db
        .update_invoice(
            company_id,
            id,
            body.total,
            body.status,
            body.issue_date,
            body.due_date,
        )?
        .ok_or_else(|| AppError::not_found("Invoice not found"))?;
    Ok(Json(invoice))
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub cui: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// GET /api/invoices/clients - List the company's clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Client>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_clients(company_id)?))
}

/// POST /api/invoices/clients - Create a client
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateClientRequest>,
) -> Result<Json<Client>, AppError> {
    let company_id = auth.company_scope()?;

    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("Client name is required"));
    }

    let id = state.db.create_client(
        company_id,
        &body.name,
        body.cui.as_deref(),
        body.email.as_deref(),
    )?;
    let client = state
        .db
        .get_client(company_id, id)?
        .ok_or_else(|| AppError::internal("Client vanished after creation"))?;
    Ok(Json(client))
}
