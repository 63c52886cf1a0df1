use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::{CategoryResponse, Equipment, EquipmentFilter, EquipmentStatus, IconKind, IconRef};
use crate::services::EquipmentRepository;
use crate::utils::{ApiError, ApiResponse};

pub type Catalog = Box<dyn EquipmentRepository>;

#[openapi(tag = "Catalog")]
#[get("/catalog/categories")]
pub async fn get_categories(catalog: &State<Catalog>) -> Json<ApiResponse<Vec<CategoryResponse>>> {
    let categories = catalog.categories().await;
    Json(ApiResponse::success(
        categories.iter().map(CategoryResponse::from).collect(),
    ))
}

#[openapi(tag = "Catalog")]
#[get("/catalog/icons")]
pub async fn get_icons() -> Json<ApiResponse<Vec<IconRef>>> {
    Json(ApiResponse::success(IconKind::all().map(IconRef::from).collect()))
}

/// Public listing; hidden equipment never appears here.
#[openapi(tag = "Catalog")]
#[get("/catalog/equipment?<filter..>")]
pub async fn search_equipment(
    catalog: &State<Catalog>,
    filter: EquipmentFilter,
) -> Json<ApiResponse<Vec<Equipment>>> {
    let mut items = catalog.list(&filter).await;
    items.retain(|item| item.status != EquipmentStatus::Hidden);
    Json(ApiResponse::success(items))
}

#[openapi(tag = "Catalog")]
#[get("/catalog/equipment/<id>")]
pub async fn get_equipment(
    catalog: &State<Catalog>,
    id: &str,
) -> Result<Json<ApiResponse<Equipment>>, ApiError> {
    let item = catalog
        .get(id)
        .await
        .filter(|item| item.status != EquipmentStatus::Hidden)
        .ok_or_else(|| ApiError::not_found("Equipment not found"))?;
    Ok(Json(ApiResponse::success(item)))
}
