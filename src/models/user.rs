use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

/// Closed set of authenticated principals. The variant decides which
/// collection the identity row lives in.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl Role {
    pub fn collection(&self) -> &'static str {
        match self {
            Role::Admin => "admins",
            Role::Rider | Role::Driver => "users",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "rider",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "rider" => Some(Role::Rider),
            "driver" => Some(Role::Driver),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Null until OTP-gated signup completes or an admin issues a reset.
    pub password: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, Clone, JsonSchema)]
pub struct UserCreateDto {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VerifyTokenDto {
    pub email: String,
    pub token: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResendTokenDto {
    pub email: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub is_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
            is_verified: user.is_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_maps_to_identity_collection() {
        assert_eq!(Role::Admin.collection(), "admins");
        assert_eq!(Role::Rider.collection(), "users");
        assert_eq!(Role::Driver.collection(), "users");
    }

    #[test]
    fn role_parses_lowercase_names_only() {
        assert_eq!(Role::parse("rider"), Some(Role::Rider));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse("Rider"), None);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Driver).unwrap(), "\"driver\"");
    }
}
