use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

use crate::models::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtService;

impl JwtService {
    pub fn create_access_token(
        user_id: &ObjectId,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let minutes = crate::config::Config::access_token_expire_minutes();
        Self::encode_claims(user_id, role, minutes)
    }

    pub fn create_refresh_token(
        user_id: &ObjectId,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let minutes = crate::config::Config::refresh_token_expire_minutes();
        Self::encode_claims(user_id, role, minutes)
    }

    fn encode_claims(
        user_id: &ObjectId,
        role: Role,
        expire_minutes: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            id: user_id.to_hex(),
            role: role.as_str().to_string(),
            exp: now + expire_minutes * 60,
            iat: now,
        };

        let secret = crate::config::Config::jwt_secret();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Fails on a bad signature or an expired token; both surface to the
    /// caller as a single invalid-token case.
    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = crate::config::Config::jwt_secret();

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_roundtrip_carries_id_and_role() {
        let id = ObjectId::new();
        let token = JwtService::create_access_token(&id, Role::Rider).unwrap();
        let claims = JwtService::verify_token(&token).unwrap();
        assert_eq!(claims.id, id.to_hex());
        assert_eq!(claims.role, "rider");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let id = ObjectId::new();
        let token = JwtService::encode_claims(&id, Role::Admin, -5).unwrap();
        assert!(JwtService::verify_token(&token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let id = ObjectId::new();
        let token = JwtService::create_access_token(&id, Role::Driver).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });
        assert!(JwtService::verify_token(&tampered).is_err());
    }
}
