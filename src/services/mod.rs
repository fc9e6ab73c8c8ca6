pub mod email;
pub mod geo;
pub mod jwt;
pub mod rate_limit;

pub use email::EmailService;
pub use jwt::JwtService;
pub use rate_limit::RateLimiter;
