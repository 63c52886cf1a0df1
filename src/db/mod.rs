use rocket::fairing::AdHoc;
use std::sync::Arc;

use crate::config::AppSettings;
use crate::routes::catalog::Catalog;
use crate::services::{
    MockEquipmentRepository, RegistrationService, RegistrationSettings, UserDirectory,
};

/// Loads the fixture-backed stores that stand in for a database and
/// hands them to Rocket as managed state.
pub fn init(settings: AppSettings) -> AdHoc {
    AdHoc::try_on_ignite("Mock data", |rocket| async move {
        let users = match UserDirectory::seeded(settings.bcrypt_cost) {
            Ok(users) => Arc::new(users),
            Err(e) => {
                error!("✗ Failed to load user fixtures: {}", e);
                return Err(rocket);
            }
        };

        let catalog: Catalog = match MockEquipmentRepository::from_fixtures(settings.catalog_latency) {
            Ok(repo) => Box::new(repo),
            Err(e) => {
                error!("✗ Failed to load catalog fixtures: {}", e);
                return Err(rocket);
            }
        };

        let registrations =
            RegistrationService::new(Arc::clone(&users), RegistrationSettings::from(&settings));

        info!("✓ Mock data loaded (otp mode: {:?})", settings.otp_mode);
        Ok(rocket
            .manage(users)
            .manage(catalog)
            .manage(registrations)
            .manage(settings))
    })
}
