//! Contract handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{AppError, AppState, AuthContext, SuccessResponse};
use contaai_core::models::{Contract, ContractStatus, NewContract};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRequest {
    pub number: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default, rename = "type")]
    pub contract_type: Option<String>,
    #[serde(default = "default_contract_status")]
    pub status: ContractStatus,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_contract_status() -> ContractStatus {
    ContractStatus::Draft
}

fn default_currency() -> String {
    "RON".to_string()
}

impl ContractRequest {
    fn into_new_contract(self) -> NewContract {
        NewContract {
            number: self.number,
            title: self.title,
            client_name: self.client_name,
            contract_type: self.contract_type,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            value: self.value,
            currency: self.currency,
        }
    }
}

/// GET /api/contracts - List the company's contracts
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Contract>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_contracts(company_id)?))
}

/// POST /api/contracts - Create a contract
pub async fn create_contract(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ContractRequest>,
) -> Result<Json<Contract>, AppError> {
    let company_id = auth.company_scope()?;

    if body.number.trim().is_empty() {
        return Err(AppError::bad_request("Contract number is required"));
    }

    let id = state
        .db
        .create_contract(company_id, &body.into_new_contract())?;
    let contract = state
        .db
        .get_contract(company_id, id)?
        .ok_or_else(|| AppError::internal("Contract vanished after creation"))?;
    Ok(Json(contract))
}

/// PUT /api/contracts/:id - Replace a contract's fields
pub async fn update_contract(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<ContractRequest>,
) -> Result<Json<Contract>, AppError> {
    let company_id = auth.company_scope()?;

    let contract = state
        .db
        .update_contract(company_id, id, &body.into_new_contract())?
        .ok_or_else(|| AppError::not_found("Contract not found"))?;
    Ok(Json(contract))
}

/// DELETE /api/contracts/:id - Delete a contract
pub async fn delete_contract(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let company_id = auth.company_scope()?;

    if !state.db.delete_contract(company_id, id)? {
        return Err(AppError::not_found("Contract not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
