use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use mongodb::options::UpdateOptions;

use crate::db::DbConn;
use crate::models::{
    OneTimeToken, OtpOutcome, ResendTokenDto, Role, User, UserCreateDto, UserResponse,
    VerifyTokenDto,
};
use crate::services::EmailService;
use crate::utils::{generate_otp, translate_db_error, validate_email, ApiError, ApiResponse};
use crate::utils::password;

/// Upsert the user's one-time token (one active token per user) and send it.
/// The email itself is best-effort; only the store write can fail the call.
async fn issue_otp(db: &DbConn, user_id: ObjectId, email: &str) -> Result<i64, ApiError> {
    let token = generate_otp();
    let expires_at = DateTime::from_millis(
        DateTime::now().timestamp_millis() + OneTimeToken::VALIDITY_MINUTES * 60 * 1000,
    );

    db.collection::<OneTimeToken>("otps")
        .update_one(
            doc! { "user_id": user_id },
            doc! {
                "$set": { "token": token, "expires_at": expires_at },
                "$setOnInsert": { "user_id": user_id, "created_at": DateTime::now() },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await
        .map_err(|e| translate_db_error(e, "Issuing token"))?;

    EmailService::send_otp_email(email, token).await;
    Ok(token)
}

/// --------------------
/// Create / claim user
/// --------------------
#[post("/user", data = "<dto>")]
pub async fn create_user(
    db: &State<DbConn>,
    dto: Json<UserCreateDto>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let dto = dto.into_inner();

    if !validate_email(&dto.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    let Some(plain) = dto.password.as_deref() else {
        return Err(ApiError::bad_request("password is required"));
    };

    let users = db.collection::<User>("users");
    let existing = users
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| translate_db_error(e, "Creating user"))?;

    let digest = password::hash(plain)?;

    // A user row may pre-exist from a booking made without signup. Claiming
    // it sets the password; a row that already has one must go to login.
    let user = match existing {
        Some(user) if user.password.is_some() => {
            return Err(ApiError::not_acceptable(
                "User with email already exists. Try Login..",
            ));
        }
        Some(user) => {
            let user_id = user
                .id
                .ok_or_else(|| ApiError::internal_error("User row has no id"))?;
            users
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": {
                        "first_name": &dto.first_name,
                        "last_name": &dto.last_name,
                        "phone": &dto.phone,
                        "password": &digest,
                    }},
                    None,
                )
                .await
                .map_err(|e| translate_db_error(e, "Creating user"))?;

            User {
                first_name: dto.first_name.clone(),
                last_name: dto.last_name.clone(),
                phone: dto.phone.clone(),
                password: Some(digest),
                ..user
            }
        }
        None => {
            let user = User {
                id: None,
                first_name: dto.first_name.clone(),
                last_name: dto.last_name.clone(),
                email: dto.email.clone(),
                phone: dto.phone.clone(),
                password: Some(digest),
                role: Role::Rider,
                is_verified: false,
                created_at: DateTime::now(),
            };
            let res = users
                .insert_one(&user, None)
                .await
                .map_err(|e| translate_db_error(e, "Creating user"))?;

            User {
                id: res.inserted_id.as_object_id(),
                ..user
            }
        }
    };

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User row has no id"))?;
    issue_otp(db, user_id, &user.email).await?;

    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}

/// --------------------
/// Verify OTP
/// --------------------
#[post("/user/token", data = "<dto>")]
pub async fn verify_otp(
    db: &State<DbConn>,
    dto: Json<VerifyTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| translate_db_error(e, "Checking token"))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User row has no id"))?;

    let otp = db
        .collection::<OneTimeToken>("otps")
        .find_one(doc! { "user_id": user_id }, None)
        .await
        .map_err(|e| translate_db_error(e, "Checking token"))?
        .ok_or_else(|| ApiError::conflict("Email wrong or not in db"))?;

    debug!("Token for {} expires at {}", dto.email, otp.expires_at);

    match otp.check(dto.token, DateTime::now()) {
        OtpOutcome::Expired => Err(ApiError::conflict("token expired")),
        OtpOutcome::Mismatch => Err(ApiError::conflict("token incorrect")),
        OtpOutcome::Match => {
            // Idempotent: verifying twice just re-sets the same flag.
            db.collection::<User>("users")
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": { "is_verified": true } },
                    None,
                )
                .await
                .map_err(|e| translate_db_error(e, "Checking token"))?;

            Ok(Json(ApiResponse::success(
                serde_json::json!({ "msg": "match" }),
            )))
        }
    }
}

/// --------------------
/// Resend OTP
/// --------------------
#[post("/user/resend/token", data = "<dto>")]
pub async fn resend_otp(
    db: &State<DbConn>,
    dto: Json<ResendTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| translate_db_error(e, "Resending token"))?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if user.is_verified {
        debug!("User already verified: {}", dto.email);
        return Err(ApiError::not_acceptable("User already verified"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User row has no id"))?;

    let token = generate_otp();
    let expires_at = DateTime::from_millis(
        DateTime::now().timestamp_millis() + OneTimeToken::VALIDITY_MINUTES * 60 * 1000,
    );

    // Reissue replaces the existing token; there is nothing to reissue for a
    // user who never got one.
    let res = db
        .collection::<OneTimeToken>("otps")
        .update_one(
            doc! { "user_id": user_id },
            doc! { "$set": { "token": token, "expires_at": expires_at } },
            None,
        )
        .await
        .map_err(|e| translate_db_error(e, "Resending token"))?;

    if res.matched_count == 0 {
        debug!("No token to update for {}", dto.email);
        return Err(ApiError::not_found("No token to update"));
    }

    EmailService::send_otp_email(&dto.email, token).await;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "msg": "token sent" }),
    )))
}
