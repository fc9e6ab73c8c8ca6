use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId, Document};

use crate::db::DbConn;
use crate::models::Role;
use crate::utils::ApiError;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

/// JWT-based authentication guard. Verifies the access token, then loads the
/// identity row from the role-appropriate collection.
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: Role,
    pub email: String,
}

impl AuthGuard {
    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.role != Role::Admin {
            return Err(ApiError::unauthorized("Exclusive to admins only"));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(token) = req.headers().get_one("Authorization") else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let token = token.trim_start_matches("Bearer ");

        let claims = match crate::services::JwtService::verify_token(token) {
            Ok(claims) => claims,
            Err(_) => return Outcome::Error((Status::Unauthorized, ())),
        };

        let Some(role) = Role::parse(&claims.role) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let Ok(user_id) = ObjectId::parse_str(&claims.id) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match req.guard::<&State<DbConn>>().await {
            Outcome::Success(db) => db,
            _ => return Outcome::Error((Status::ServiceUnavailable, ())),
        };

        // The token is stateless; the row lookup confirms the identity
        // still exists in its role's collection.
        let row = db
            .collection::<Document>(role.collection())
            .find_one(doc! { "_id": user_id }, None)
            .await;

        match row {
            Ok(Some(doc)) => Outcome::Success(AuthGuard {
                user_id,
                role,
                email: doc.get_str("email").unwrap_or_default().to_string(),
            }),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

/// Refresh-token extraction: Authorization header first, cookie fallback.
/// Never rejects the request; the route decides what a missing token means.
pub struct RefreshTokenSource(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RefreshTokenSource {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let from_header = req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = from_header.or_else(|| {
            req.cookies()
                .get("refresh_token")
                .map(|c| c.value().to_string())
        });

        Outcome::Success(RefreshTokenSource(token))
    }
}

/// === OpenAPI Integration (Fallback for older versions) ===
/// Keeps OpenAPI generation working even without new traits.
impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for RefreshTokenSource {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
