pub mod auth;
pub mod role;

pub use auth::{AuthContext, AuthGuard};
pub use role::{AdminGuard, LessorGuard};
