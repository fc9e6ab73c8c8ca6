use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    /// Access-token lifetime in minutes.
    pub fn access_token_expire_minutes() -> i64 {
        Self::figment()
            .extract_inner("access_token_expire_minutes")
            .unwrap_or(30)
    }

    /// Refresh-token lifetime in minutes (30 days).
    pub fn refresh_token_expire_minutes() -> i64 {
        Self::figment()
            .extract_inner("refresh_token_expire_minutes")
            .unwrap_or(43_200)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/limo-booking".to_string())
    }

    pub fn redis_url() -> String {
        Self::figment()
            .extract_inner("redis_url")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    /// Reference timezone bookings are presented in.
    pub fn booking_timezone() -> String {
        Self::figment()
            .extract_inner("booking_timezone")
            .unwrap_or_else(|_| "America/Chicago".to_string())
    }

    /// Mailbox the admin-facing booking notifications go to.
    pub fn admin_notify_email() -> String {
        Self::figment()
            .extract_inner("admin_notify_email")
            .unwrap_or_default()
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
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
            .unwrap_or_else(|_| "Limo Booking <noreply@limobooking.com>".to_string())
    }

    pub fn is_production() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "production"
    }
}
