use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use std::sync::Arc;
use log::info;

use crate::guards::AuthContext;
use crate::models::{AuthenticatedUser, LoginDto};
use crate::services::{JwtService, UserDirectory};
use crate::utils::{validate_email, ApiError, ApiResponse};

#[derive(Debug, serde::Serialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: AuthenticatedUser,
}

#[derive(Debug, serde::Serialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<AuthenticatedUser>,
}

/// --------------------
/// Login
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    users: &State<Arc<UserDirectory>>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if !validate_email(dto.email.trim()) {
        return Err(ApiError::bad_request("Invalid email"));
    }

    let user = users
        .authenticate(&dto.email, &dto.password)
        .await
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let access_token = JwtService::generate_access_token(&user)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    info!("✓ {} signed in as {:?}", user.email, user.role);
    Ok(Json(ApiResponse::success_with_message(
        "Login successful".to_string(),
        LoginResponse { access_token, user },
    )))
}

/// --------------------
/// Current session
/// --------------------
#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(auth: AuthContext) -> Json<ApiResponse<SessionResponse>> {
    Json(ApiResponse::success(SessionResponse {
        authenticated: auth.user.is_some(),
        user: auth.user,
    }))
}
