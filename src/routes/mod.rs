pub mod admin;
pub mod auth;
pub mod catalog;
pub mod lessor;
pub mod registration;
