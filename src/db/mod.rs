use mongodb::{Client, Database};
use rocket::fairing::AdHoc;

use crate::services::rate_limit::{RateLimiter, RedisCounterStore};

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database("limo-booking"))
}

/// Counter store for login rate limiting. A failed connection is not fatal:
/// the limiter is managed without a backend and fails open.
pub fn init_rate_limiter() -> AdHoc {
    AdHoc::on_ignite("Redis rate limiter", |rocket| async {
        let url = crate::config::Config::redis_url();
        match redis::Client::open(url.as_str()) {
            Ok(client) => {
                info!("✓ Redis counter store configured");
                rocket.manage(RateLimiter::new(Some(Box::new(RedisCounterStore::new(
                    client,
                )))))
            }
            Err(e) => {
                warn!("✗ Redis unavailable, login rate limiting disabled: {}", e);
                rocket.manage(RateLimiter::new(None))
            }
        }
    })
}

pub type DbConn = Database;
