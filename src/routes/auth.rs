use rocket::serde::json::Json;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::time::Duration;
use std::net::IpAddr;
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::DbConn;
use crate::guards::RefreshTokenSource;
use crate::models::{Admin, LoginDto, Role, TokenResponse, User};
use crate::services::{JwtService, RateLimiter};
use crate::utils::{translate_db_error, ApiError, ApiResponse};
use crate::utils::password;

fn invalid_credentials() -> ApiError {
    // One message for every branch so a probe can't tell which part failed.
    ApiError::forbidden("Invalid credentials")
}

/// --------------------
/// Login
/// --------------------
#[post("/auth/login?<is_admin>", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    client_ip: Option<IpAddr>,
    is_admin: bool,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let ip = client_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let attempts_key = limiter.check(&dto.email, &ip).await?;

    // Admin logins live in their own identity collection.
    let (user_id, role, stored_password) = if is_admin {
        let admin = db
            .collection::<Admin>(Role::Admin.collection())
            .find_one(doc! { "email": &dto.email }, None)
            .await
            .map_err(|e| translate_db_error(e, "login lookup"))?;

        match admin {
            Some(a) => (a.id, Role::Admin, a.password),
            None => {
                warn!("Admin not found: {}", dto.email);
                return Err(invalid_credentials());
            }
        }
    } else {
        let user = db
            .collection::<User>(Role::Rider.collection())
            .find_one(doc! { "email": &dto.email }, None)
            .await
            .map_err(|e| translate_db_error(e, "login lookup"))?;

        match user {
            Some(u) => (u.id, u.role, u.password),
            None => {
                warn!("User not found: {}", dto.email);
                return Err(invalid_credentials());
            }
        }
    };

    info!("Login attempt for role: {}", role.as_str());

    // A null password (signup not completed) is the same failure as a
    // wrong one.
    let matches = stored_password
        .as_deref()
        .map(|digest| password::verify(&dto.password, digest))
        .unwrap_or(false);

    if !matches {
        warn!("Invalid password for: {}", dto.email);
        return Err(invalid_credentials());
    }

    limiter.clear(attempts_key.as_ref()).await;

    let user_id = user_id.ok_or_else(|| ApiError::internal_error("Identity row has no id"))?;
    let access_token = JwtService::create_access_token(&user_id, role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let secure = crate::config::Config::is_production();

    cookies.add(
        Cookie::build(("access_token", access_token.clone()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::minutes(
                crate::config::Config::access_token_expire_minutes(),
            )),
    );

    // Riders and drivers get a refresh token; admins re-authenticate.
    if !is_admin {
        let refresh_token = JwtService::create_refresh_token(&user_id, role)
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        cookies.add(
            Cookie::build(("refresh_token", refresh_token))
                .http_only(true)
                .secure(secure)
                .same_site(SameSite::Lax)
                .max_age(Duration::minutes(
                    crate::config::Config::refresh_token_expire_minutes(),
                )),
        );
    }

    info!("Login successful for {}: {}", role.as_str(), dto.email);

    Ok(Json(ApiResponse::success(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    })))
}

/// --------------------
/// Silent access-token refresh
/// --------------------
/// The refresh token itself is not rotated; a new access token is issued.
#[post("/auth/refresh")]
pub async fn refresh_token(
    source: RefreshTokenSource,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let Some(token) = source.0 else {
        error!("Refresh requested without a token");
        return Err(ApiError::unauthorized("No refresh token"));
    };

    let claims = JwtService::verify_token(&token).map_err(|e| {
        if matches!(
            e.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ) {
            ApiError::unauthorized("Refresh token expired")
        } else {
            ApiError::unauthorized("Invalid refresh token")
        }
    })?;

    let role = Role::parse(&claims.role)
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;
    let user_id = ObjectId::parse_str(&claims.id)
        .map_err(|_| ApiError::unauthorized("Invalid user id in token"))?;

    let access_token = JwtService::create_access_token(&user_id, role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    })))
}
