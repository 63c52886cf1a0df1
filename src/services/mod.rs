pub mod catalog;
pub mod email;
pub mod jwt;
pub mod registration;
pub mod users;

pub use catalog::{EquipmentRepository, MockEquipmentRepository};
pub use email::EmailService;
pub use jwt::JwtService;
pub use registration::{RegistrationError, RegistrationService, RegistrationSettings};
pub use users::UserDirectory;
