//! Reconciliation handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthContext};
use contaai_core::models::{MatchedKind, Reconciliation, ReconciliationStatus};
use contaai_core::reconcile::Reconciler;

#[derive(Serialize)]
pub struct ReconciliationRunResponse {
    pub reconciliations: Vec<Reconciliation>,
    pub matched: usize,
    pub unmatched: usize,
}

/// POST /api/reconciliation/statements/:id/run - Match a statement's lines
pub async fn run_reconciliation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(statement_id): Path<i64>,
) -> Result<Json<ReconciliationRunResponse>, AppError> {
    let company_id = auth.company_scope()?;

    if state.db.get_statement(company_id, statement_id)?.is_none() {
        return Err(AppError::not_found("Bank statement not found"));
    }

    let reconciliations =
        Reconciler::new(&state.db).reconcile_statement(company_id, statement_id)?;

    let matched = reconciliations
        .iter()
        .filter(|r| r.status == ReconciliationStatus::Matched)
        .count();
    let unmatched = reconciliations.len() - matched;

    state.db.log_audit(
        &auth.email,
        "reconcile",
        Some("bank_statement"),
        Some(statement_id),
        Some(&format!("matched={}, unmatched={}", matched, unmatched)),
    )?;

    Ok(Json(ReconciliationRunResponse {
        reconciliations,
        matched,
        unmatched,
    }))
}

/// GET /api/reconciliation/statements/:id - Active links for a statement
pub async fn list_reconciliations(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(statement_id): Path<i64>,
) -> Result<Json<Vec<Reconciliation>>, AppError> {
    let company_id = auth.company_scope()?;

    if state.db.get_statement(company_id, statement_id)?.is_none() {
        return Err(AppError::not_found("Bank statement not found"));
    }

    Ok(Json(
        state
            .db
            .list_statement_reconciliations(company_id, statement_id)?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReconciliationRequest {
    pub bank_transaction_id: i64,
    pub matched_kind: MatchedKind,
    pub matched_id: i64,
}

/// POST /api/reconciliation/manual - Record an operator's explicit pairing
pub async fn manual_reconciliation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ManualReconciliationRequest>,
) -> Result<Json<Reconciliation>, AppError> {
    let company_id = auth.company_scope()?;

    if state
        .db
        .get_bank_transaction(company_id, body.bank_transaction_id)?
        .is_none()
    {
        return Err(AppError::not_found("Bank transaction not found"));
    }
    let target_exists = match body.matched_kind {
        MatchedKind::Invoice => state.db.get_invoice(company_id, body.matched_id)?.is_some(),
        MatchedKind::Transaction => state
            .db
            .get_transaction(company_id, body.matched_id)?
            .is_some(),
    };
    if !target_exists {
        return Err(AppError::not_found("Matched entity not found"));
    }

    let reconciliation = Reconciler::new(&state.db).manual_reconcile(
        company_id,
        body.bank_transaction_id,
        body.matched_kind,
        body.matched_id,
    )?;

    state.db.log_audit(
        &auth.email,
        "manual_reconcile",
        Some("bank_transaction"),
        Some(body.bank_transaction_id),
        Some(&format!(
            "matched_kind={}, matched_id={}",
            body.matched_kind, body.matched_id
        )),
    )?;

    Ok(Json(reconciliation))
}
