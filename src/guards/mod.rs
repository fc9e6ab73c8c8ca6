pub mod auth;

pub use auth::{AuthGuard, RefreshTokenSource};
