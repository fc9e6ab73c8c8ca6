pub mod admin;
pub mod booking;
pub mod otp;
pub mod user;

pub use admin::*;
pub use booking::*;
pub use otp::*;
pub use user::*;
