//! Product handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{AppError, AppState, AuthContext, SuccessResponse};
use contaai_core::models::{NewProduct, Product, ProductStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub category: Option<String>,
    pub unit_price: Decimal,
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_min_stock")]
    pub min_stock: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_product_status")]
    pub status: ProductStatus,
}

fn default_vat_rate() -> f64 {
    19.0
}

fn default_min_stock() -> i64 {
    5
}

fn default_unit() -> String {
    "buc".to_string()
}

fn default_product_status() -> ProductStatus {
    ProductStatus::Active
}

impl ProductRequest {
    fn into_new_product(self) -> NewProduct {
        NewProduct {
            name: self.name,
            sku: self.sku,
            category: self.category,
            unit_price: self.unit_price,
            vat_rate: self.vat_rate,
            stock: self.stock,
            min_stock: self.min_stock,
            unit: self.unit,
            status: self.status,
        }
    }
}

/// GET /api/products - List the company's products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Product>>, AppError> {
    let company_id = auth.company_scope()?;
    Ok(Json(state.db.list_products(company_id)?))
}

/// POST /api/products - Create a product
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    let company_id = auth.company_scope()?;

    if body.name.trim().is_empty() || body.sku.trim().is_empty() {
        return Err(AppError::bad_request("Product name and SKU are required"));
    }
    if body.unit_price < Decimal::ZERO || body.stock < 0 {
        return Err(AppError::bad_request(
            "Unit price and stock must be non-negative",
        ));
    }

    let id = state
        .db
        .create_product(company_id, &body.into_new_product())?;
    let product = state
        .db
        .get_product(company_id, id)?
        .ok_or_else(|| AppError::internal("Product vanished after creation"))?;
    Ok(Json(product))
}

/// PUT /api/products/:id - Replace a product's fields
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    let company_id = auth.company_scope()?;

    let product = state
        .db
        .update_product(company_id, id, &body.into_new_product())?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - Delete a product
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let company_id = auth.company_scope()?;

    if !state.db.delete_product(company_id, id)? {
        return Err(AppError::not_found("Product not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
