use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use std::sync::Arc;
use uuid::Uuid;
use log::info;

use crate::guards::AdminGuard;
use crate::models::{
    Equipment, RegistrationView, UpdateEquipmentStatusDto, UpdateUserStatusDto, UserResponse,
};
use crate::routes::catalog::Catalog;
use crate::services::{RegistrationService, UserDirectory};
use crate::utils::{ApiError, ApiResponse};

// ============================================================================
// USERS
// ============================================================================

#[openapi(tag = "Admin")]
#[get("/admin/users")]
pub async fn get_all_users(
    users: &State<Arc<UserDirectory>>,
    _admin: AdminGuard,
) -> Json<ApiResponse<Vec<UserResponse>>> {
    let accounts = users.list().await;
    Json(ApiResponse::success(accounts.iter().map(UserResponse::from).collect()))
}

#[openapi(tag = "Admin")]
#[put("/admin/users/<id>/status", data = "<dto>")]
pub async fn update_user_status(
    users: &State<Arc<UserDirectory>>,
    admin: AdminGuard,
    id: &str,
    dto: Json<UpdateUserStatusDto>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid user id"))?;
    if id == admin.user.id && !dto.is_active {
        return Err(ApiError::forbidden("You cannot deactivate your own account"));
    }

    let account = users
        .set_active(id, dto.is_active)
        .await
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!("Admin {} set {} active={}", admin.user.email, account.email, account.is_active);
    Ok(Json(ApiResponse::success_with_message(
        "User status updated".to_string(),
        UserResponse::from(&account),
    )))
}

// ============================================================================
// REGISTRATIONS
// ============================================================================

#[openapi(tag = "Admin")]
#[get("/admin/registrations")]
pub async fn get_all_registrations(
    registrations: &State<RegistrationService>,
    _admin: AdminGuard,
) -> Json<ApiResponse<Vec<RegistrationView>>> {
    Json(ApiResponse::success(registrations.list().await))
}

// ============================================================================
// EQUIPMENT
// ============================================================================

#[openapi(tag = "Admin")]
#[put("/admin/equipment/<id>/status", data = "<dto>")]
pub async fn update_equipment_status(
    catalog: &State<Catalog>,
    admin: AdminGuard,
    id: &str,
    dto: Json<UpdateEquipmentStatusDto>,
) -> Result<Json<ApiResponse<Equipment>>, ApiError> {
    let item = catalog
        .set_status(id, dto.status)
        .await
        .ok_or_else(|| ApiError::not_found("Equipment not found"))?;

    info!("Admin {} set {} to {:?}", admin.user.email, item.id, item.status);
    Ok(Json(ApiResponse::success_with_message(
        "Status updated".to_string(),
        item,
    )))
}
