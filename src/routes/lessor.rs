use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use log::info;

use crate::guards::LessorGuard;
use crate::models::{Equipment, UpdateEquipmentStatusDto};
use crate::routes::catalog::Catalog;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Lessor")]
#[get("/lessor/equipment")]
pub async fn my_equipment(
    catalog: &State<Catalog>,
    lessor: LessorGuard,
) -> Json<ApiResponse<Vec<Equipment>>> {
    Json(ApiResponse::success(catalog.list_for_lessor(lessor.user.id).await))
}

#[openapi(tag = "Lessor")]
#[put("/lessor/equipment/<id>/status", data = "<dto>")]
pub async fn update_my_equipment_status(
    catalog: &State<Catalog>,
    lessor: LessorGuard,
    id: &str,
    dto: Json<UpdateEquipmentStatusDto>,
) -> Result<Json<ApiResponse<Equipment>>, ApiError> {
    // Someone else's listing is reported as missing, not forbidden.
    let owned = catalog
        .get(id)
        .await
        .is_some_and(|item| item.lessor_id == lessor.user.id);
    if !owned {
        return Err(ApiError::not_found("Equipment not found"));
    }

    let item = catalog
        .set_status(id, dto.status)
        .await
        .ok_or_else(|| ApiError::not_found("Equipment not found"))?;

    info!("Lessor {} set {} to {:?}", lessor.user.email, item.id, item.status);
    Ok(Json(ApiResponse::success_with_message(
        "Status updated".to_string(),
        item,
    )))
}
