use rocket::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Category, Equipment, EquipmentFilter, EquipmentStatus};

const CATEGORY_FIXTURE: &str = include_str!("../../fixtures/categories.json");
const EQUIPMENT_FIXTURE: &str = include_str!("../../fixtures/equipment.json");

#[derive(Debug)]
pub enum RepositoryError {
    Fixture(serde_json::Error),
    UnknownCategory(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::Fixture(e) => write!(f, "Invalid catalog fixture: {}", e),
            RepositoryError::UnknownCategory(id) => {
                write!(f, "Equipment refers to unknown category '{}'", id)
            }
        }
    }
}

/// Source of equipment listings.
///
/// Routes only see this trait, so the mock can be swapped for a real
/// backend without touching them.
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn categories(&self) -> Vec<Category>;

    async fn list(&self, filter: &EquipmentFilter) -> Vec<Equipment>;

    async fn list_for_lessor(&self, lessor_id: Uuid) -> Vec<Equipment>;

    async fn get(&self, id: &str) -> Option<Equipment>;

    async fn set_status(&self, id: &str, status: EquipmentStatus) -> Option<Equipment>;
}

/// Fixture-backed repository that answers after a fixed delay.
pub struct MockEquipmentRepository {
    categories: Vec<Category>,
    items: RwLock<Vec<Equipment>>,
    latency: Duration,
}

impl MockEquipmentRepository {
    pub fn new(
        categories: Vec<Category>,
        items: Vec<Equipment>,
        latency: Duration,
    ) -> Result<Self, RepositoryError> {
        if let Some(orphan) = items
            .iter()
            .find(|item| !categories.iter().any(|c| c.id == item.category_id))
        {
            return Err(RepositoryError::UnknownCategory(orphan.category_id.clone()));
        }

        Ok(MockEquipmentRepository {
            categories,
            items: RwLock::new(items),
            latency,
        })
    }

    pub fn from_fixtures(latency: Duration) -> Result<Self, RepositoryError> {
        let categories = serde_json::from_str(CATEGORY_FIXTURE).map_err(RepositoryError::Fixture)?;
        let items = serde_json::from_str(EQUIPMENT_FIXTURE).map_err(RepositoryError::Fixture)?;
        Self::new(categories, items, latency)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl EquipmentRepository for MockEquipmentRepository {
    async fn categories(&self) -> Vec<Category> {
        self.simulate_latency().await;
        self.categories.clone()
    }

    async fn list(&self, filter: &EquipmentFilter) -> Vec<Equipment> {
        self.simulate_latency().await;
        self.items
            .read()
            .await
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect()
    }

    async fn list_for_lessor(&self, lessor_id: Uuid) -> Vec<Equipment> {
        self.simulate_latency().await;
        self.items
            .read()
            .await
            .iter()
            .filter(|item| item.lessor_id == lessor_id)
            .cloned()
            .collect()
    }

    async fn get(&self, id: &str) -> Option<Equipment> {
        self.simulate_latency().await;
        self.items.read().await.iter().find(|item| item.id == id).cloned()
    }

    async fn set_status(&self, id: &str, status: EquipmentStatus) -> Option<Equipment> {
        self.simulate_latency().await;
        let mut items = self.items.write().await;
        let item = items.iter_mut().find(|item| item.id == id)?;
        item.status = status;
        Some(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn repo() -> MockEquipmentRepository {
        MockEquipmentRepository::from_fixtures(Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn fixtures_load_and_filter() {
        let repo = repo();
        assert_eq!(repo.categories().await.len(), 6);

        let filter = EquipmentFilter {
            province: Some("Suphan Buri".into()),
            ..Default::default()
        };
        let ids: Vec<String> = repo.list(&filter).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["EQ-003", "EQ-004"]);
    }

    #[tokio::test]
    async fn status_toggle_is_visible_to_later_reads() {
        let repo = repo();
        let updated = repo.set_status("EQ-004", EquipmentStatus::Available).await.unwrap();
        assert_eq!(updated.status, EquipmentStatus::Available);
        assert_eq!(repo.get("EQ-004").await.unwrap().status, EquipmentStatus::Available);
        assert!(repo.set_status("EQ-999", EquipmentStatus::Hidden).await.is_none());
    }

    #[tokio::test]
    async fn lessor_sees_only_own_equipment() {
        let repo = repo();
        let lessor = Uuid::parse_str("0d9b8c7a-5e4f-4a3b-8c2d-1e0f9a8b7c02").unwrap();
        let items = repo.list_for_lessor(lessor).await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|e| e.lessor_id == lessor));
    }

    #[tokio::test]
    async fn responses_wait_for_the_configured_latency() {
        let repo = MockEquipmentRepository::from_fixtures(Duration::from_millis(50)).unwrap();
        let started = Instant::now();
        repo.get("EQ-001").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn orphan_category_is_rejected() {
        let items: Vec<Equipment> = serde_json::from_str(EQUIPMENT_FIXTURE).unwrap();
        assert!(matches!(
            MockEquipmentRepository::new(Vec::new(), items, Duration::ZERO),
            Err(RepositoryError::UnknownCategory(_))
        ));
    }
}
