//! Document handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{AppError, AppState, AuthContext, SuccessResponse, MAX_UPLOAD_SIZE};
use contaai_core::models::{Document, DocumentStatus, NewDocument, Transaction};

/// Upload request: metadata plus the base64 payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/documents - List the company's documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Document>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_documents(company_id)?))
}

/// POST /api/documents - Store an uploaded document
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    let company_id = auth.company_scope()?;

    if body.file_name.trim().is_empty() {
        return Err(AppError::bad_request("fileName is required"));
    }

    // Hash the decoded payload for deduplication; a bad payload is a bad request
    let content_hash = match &body.file_data {
        Some(data) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|_| AppError::bad_request("fileData is not valid base64"))?;
            if bytes.len() > MAX_UPLOAD_SIZE {
                return Err(AppError::bad_request("File exceeds the 10 MB upload limit"));
            }
            Some(hex::encode(Sha256::digest(&bytes)))
        }
        None => None,
    };

    if let Some(hash) = &content_hash {
        if let Some(existing) = state.db.find_document_by_hash(company_id, hash)? {
            warn!(
                document_id = existing.id,
                file_name = %body.file_name,
                "Duplicate upload"
            );
            return Err(AppError::conflict("This file was already uploaded"));
        }
    }

    let id = state.db.create_document(
        company_id,
        &NewDocument {
            file_name: body.file_name,
            file_size: body.file_size,
            file_type: body.file_type,
            file_data: body.file_data,
            category: body.category,
            content_hash,
        },
    )?;

    let document = state
        .db
        .get_document(company_id, id)?
        .ok_or_else(|| AppError::internal("Document vanished after creation"))?;
    Ok(Json(document))
}

/// Mutable document fields
#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

/// PUT /api/documents/:id - Update document fields
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    let company_id = auth.company_scope()?;

    let document = state
        .db
        .update_document(
            company_id,
            id,
            body.category.as_deref(),
            body.description.as_deref(),
            body.status,
        )?
        .ok_or_else(|| AppError::not_found("Document not found"))?;
    Ok(Json(document))
}

/// DELETE /api/documents/:id - Delete a document and its transactions
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let company_id = auth.company_scope()?;

    if !state.db.delete_document(company_id, id)? {
        return Err(AppError::not_found("Document not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/documents/:id/process - Run the document through analysis
pub async fn process_document(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    let company_id = auth.company_scope()?;

    let client = state
        .analysis
        .as_ref()
        .ok_or_else(|| AppError::bad_request("Analysis service is not configured"))?;

    if state.db.get_document(company_id, id)?.is_none() {
        return Err(AppError::not_found("Document not found"));
    }

    let today = chrono::Utc::now().date_naive();
    let document =
        contaai_core::analysis::process_document(&state.db, client, company_id, id, today)
            .await
            .map_err(|e| match e {
                // The document is already marked `error`; tell the caller why
                contaai_core::Error::Analysis(msg) => AppError::bad_request(&msg),
                other => other.into(),
            })?;

    state.db.log_audit(
        &auth.email,
        "analyze_document",
        Some("document"),
        Some(id),
        None,
    )?;

    Ok(Json(document))
}

/// GET /api/documents/transactions - Generated transactions across documents
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_transactions(company_id)?))
}
