pub mod admin;
pub mod auth;
pub mod booking;
pub mod user;
