//! Authentication and registration handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{issue_token, AppError, AppState, AuthContext};
use contaai_core::models::{Company, NewCompany, User};

/// Registration request. Company data is optional: the multi-step flow
/// allows finishing company setup later via `setup-company`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company_data: Option<NewCompany>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: User,
    pub company: Option<Company>,
}

/// POST /api/auth/register - Create a user (and optionally their company)
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if body.email.trim().is_empty() || body.password.len() < 8 {
        return Err(AppError::bad_request(
            "Email and a password of at least 8 characters are required",
        ));
    }

    if state.db.get_user_by_email(&body.email)?.is_some() {
        return Err(AppError::bad_request("User already exists"));
    }

    // First user of a company registers as admin
    let user_id = state.db.create_user(
        &body.email,
        &body.password,
        &body.first_name,
        &body.last_name,
        "admin",
    )?;

    let company = match &body.company_data {
        Some(company_data) => {
            let company_id = state.db.create_company(user_id, company_data)?;
            state.db.get_company(company_id)?
        }
        None => None,
    };

    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::internal("User vanished during registration"))?;
    let token = issue_token(&state.config, &user)?;

    info!(email = %user.email, "User registered");

    Ok(Json(AuthResponse {
        message: "User registered successfully".to_string(),
        token,
        user,
        company,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login - Authenticate and issue a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .db
        .verify_password(&body.email, &body.password)?
        .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

    let company = match user.company_id {
        Some(company_id) => state.db.get_company(company_id)?,
        None => None,
    };

    let token = issue_token(&state.config, &user)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user,
        company,
    }))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
    pub company: Option<Company>,
}

/// GET /api/auth/me - Current user and company
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .db
        .get_user(auth.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let company = match user.company_id {
        Some(company_id) => state.db.get_company(company_id)?,
        None => None,
    };

    Ok(Json(MeResponse { user, company }))
}

#[derive(Serialize)]
pub struct SetupCompanyResponse {
    pub message: String,
    pub company: Company,
}

/// POST /api/auth/setup-company - Create or update the user's company
pub async fn setup_company(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<NewCompany>,
) -> Result<Json<SetupCompanyResponse>, AppError> {
    let company = match auth.company_id {
        Some(company_id) => state
            .db
            .update_company(company_id, &body)?
            .ok_or_else(|| AppError::not_found("Company not found"))?,
        None => {
            let company_id = state.db.create_company(auth.user_id, &body)?;
            state
                .db
                .get_company(company_id)?
                .ok_or_else(|| AppError::internal("Company vanished during setup"))?
        }
    };

    info!(user = %auth.email, company = %company.name, "Company setup complete");

    Ok(Json(SetupCompanyResponse {
        message: "Company setup successful".to_string(),
        company,
    }))
}
