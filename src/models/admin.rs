use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

/// Pre-provisioned admin identity. Rows are seeded without a password;
/// registration only completes the invite by setting one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Admin {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RegisterAdminDto {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RegisterResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<Admin> for RegisterResponse {
    fn from(admin: Admin) -> Self {
        RegisterResponse {
            id: admin.id.map(|id| id.to_hex()).unwrap_or_default(),
            first_name: admin.first_name,
            last_name: admin.last_name,
            email: admin.email,
        }
    }
}
