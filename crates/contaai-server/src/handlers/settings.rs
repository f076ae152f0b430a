//! Company settings handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState, AuthContext};
use contaai_core::models::{Company, NewCompany};

/// GET /api/settings/company - Company profile
pub async fn get_company_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Company>, AppError> {
    let company_id = auth.company_scope()?;

    let company = state
        .db
        .get_company(company_id)?
        .ok_or_else(|| AppError::not_found("Company not found"))?;
    Ok(Json(company))
}

/// PUT /api/settings/company - Update the company profile
pub async fn update_company_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<NewCompany>,
) -> Result<Json<Company>, AppError> {
    let company_id = auth.company_scope()?;

    let company = state
        .db
        .update_company(company_id, &body)?
        .ok_or_else(|| AppError::not_found("Company not found"))?;

    state.db.log_audit(
        &auth.email,
        "update_company",
        Some("company"),
        Some(company_id),
        None,
    )?;

    Ok(Json(company))
}
