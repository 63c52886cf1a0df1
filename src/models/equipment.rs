use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use uuid::Uuid;

use crate::models::{IconKind, IconRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Available,
    Rented,
    Maintenance,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: IconKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub lessor_id: Uuid,
    pub province: String,
    /// Baht per day.
    pub daily_rate: u32,
    pub status: EquipmentStatus,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, FromForm, Deserialize, JsonSchema)]
pub struct EquipmentFilter {
    pub category: Option<String>,
    pub province: Option<String>,
    pub status: Option<EquipmentStatus>,
    pub q: Option<String>,
}

impl EquipmentFilter {
    pub fn matches(&self, item: &Equipment) -> bool {
        if let Some(ref category) = self.category {
            if &item.category_id != category {
                return false;
            }
        }
        if let Some(ref province) = self.province {
            if !item.province.eq_ignore_ascii_case(province) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(ref q) = self.q {
            let q = q.trim().to_lowercase();
            if !q.is_empty() && !item.name.to_lowercase().contains(&q) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateEquipmentStatusDto {
    pub status: EquipmentStatus,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub icon: IconRef,
}

impl From<&Category> for CategoryResponse {
    fn from(category: &Category) -> Self {
        CategoryResponse {
            id: category.id.clone(),
            name: category.name.clone(),
            icon: category.icon.into(),
        }
    }
}
