use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;
use std::time::Duration;

use crate::models::OtpMode;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").global())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(3600)
    }

    pub fn otp_mode() -> OtpMode {
        Self::figment()
            .extract_inner("otp_mode")
            .unwrap_or_default()
    }

    pub fn otp_cooldown_secs() -> u32 {
        Self::figment()
            .extract_inner("otp_cooldown_secs")
            .unwrap_or(60)
    }

    pub fn submission_delay_ms() -> u64 {
        Self::figment()
            .extract_inner("submission_delay_ms")
            .unwrap_or(2000)
    }

    pub fn draft_ttl_secs() -> u64 {
        Self::figment()
            .extract_inner("draft_ttl_secs")
            .unwrap_or(3600)
    }

    pub fn catalog_latency_ms() -> u64 {
        Self::figment()
            .extract_inner("catalog_latency_ms")
            .unwrap_or(500)
    }

    pub fn upload_dir() -> String {
        Self::figment()
            .extract_inner("upload_dir")
            .unwrap_or_else(|_| "uploads".to_string())
    }

    pub fn bcrypt_cost() -> u32 {
        Self::figment()
            .extract_inner("bcrypt_cost")
            .unwrap_or(bcrypt::DEFAULT_COST)
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_port() -> u16 {
        Self::figment()
            .extract_inner("mail_port")
            .unwrap_or(587)
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "FarmRent <noreply@farmrent.co.th>".to_string())
    }

    pub fn is_mail_enabled() -> bool {
        !Self::mail_user().is_empty() && !Self::mail_password().is_empty()
    }
}

/// Settings the application state is built from.
///
/// Read once at launch through [`AppSettings::from_config`]; tests build
/// their own with short delays.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub otp_mode: OtpMode,
    pub otp_cooldown_secs: u32,
    pub submission_delay: Duration,
    pub draft_ttl: Duration,
    pub catalog_latency: Duration,
    pub upload_dir: String,
    pub bcrypt_cost: u32,
}

impl AppSettings {
    pub fn from_config() -> Self {
        AppSettings {
            otp_mode: Config::otp_mode(),
            otp_cooldown_secs: Config::otp_cooldown_secs(),
            submission_delay: Duration::from_millis(Config::submission_delay_ms()),
            draft_ttl: Duration::from_secs(Config::draft_ttl_secs()),
            catalog_latency: Duration::from_millis(Config::catalog_latency_ms()),
            upload_dir: Config::upload_dir(),
            bcrypt_cost: Config::bcrypt_cost(),
        }
    }
}
