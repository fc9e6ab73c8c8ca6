use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId};

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    Admin, Analysis, Booking, BookingStatus, RegisterAdminDto, RegisterResponse, Role,
    UpdateStatusDto,
};
use crate::routes::booking::{fetch_joined, reference_timezone};
use crate::services::EmailService;
use crate::utils::{translate_db_error, validate_email, validate_password, ApiError, ApiResponse};
use crate::utils::password;

/// Registration eligibility for the admin row matched by email. An existing
/// password wins over a name mismatch: an already-registered admin is
/// rejected as such even when the submitted names are wrong.
fn registration_gate(admin: &Admin, dto: &RegisterAdminDto) -> Result<(), ApiError> {
    if admin.password.is_some() {
        error!("Admin already registered: {}", admin.email);
        return Err(ApiError::forbidden(
            "This admin already has a functioning password",
        ));
    }
    if admin.first_name != dto.first_name || admin.last_name != dto.last_name {
        debug!("first_name or last_name not with us...");
        return Err(ApiError::not_found("Email entered not with us...."));
    }
    Ok(())
}

/// --------------------
/// Complete admin registration (invite flow)
/// --------------------
/// Admin rows are pre-provisioned without a password; this only sets one.
#[patch("/admin/register", data = "<dto>")]
pub async fn register(
    db: &State<DbConn>,
    dto: Json<RegisterAdminDto>,
) -> Result<Json<ApiResponse<RegisterResponse>>, ApiError> {
    let dto = dto.into_inner();

    if !validate_email(&dto.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if let Err(reason) = validate_password(&dto.password) {
        return Err(ApiError::bad_request(reason));
    }
    if dto.password != dto.confirm_password {
        return Err(ApiError::not_acceptable("Passwords do not match"));
    }

    let admins = db.collection::<Admin>(Role::Admin.collection());

    let admin = admins
        .find_one(doc! { "email": &dto.email }, None)
        .await
        .map_err(|e| translate_db_error(e, "Updating password"))?
        .ok_or_else(|| {
            debug!("email not with us...");
            ApiError::not_found("Email entered not with us....")
        })?;

    registration_gate(&admin, &dto)?;

    let digest = password::hash(&dto.password)?;
    admins
        .update_one(
            doc! { "email": &dto.email },
            doc! { "$set": { "password": &digest } },
            None,
        )
        .await
        .map_err(|e| translate_db_error(e, "Updating password"))?;

    let full_name = format!("{} {}", dto.first_name, dto.last_name);
    EmailService::send_password_set_email(&dto.email, &full_name).await;

    Ok(Json(ApiResponse::success_with_message(
        "Successfully registered account...",
        RegisterResponse::from(admin),
    )))
}

/// --------------------
/// Booking status transition
/// --------------------
#[patch("/admin/booking/<booking_id>", data = "<dto>")]
pub async fn update_booking_status(
    db: &State<DbConn>,
    auth: AuthGuard,
    booking_id: &str,
    dto: Json<UpdateStatusDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    auth.ensure_admin()?;

    let oid = ObjectId::parse_str(booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking id"))?;
    let new_status = dto.status;

    let (mut booking, user) = fetch_joined(db, oid)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no bookings at this id"))?;

    // Completed rides cannot be reopened.
    if !booking.status.can_transition_to(new_status) {
        return Err(ApiError::forbidden("already completed"));
    }

    debug!("Change status to {}...", new_status.as_str());
    db.collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": oid },
            doc! { "$set": { "status": new_status.as_str() } },
            None,
        )
        .await
        .map_err(|e| translate_db_error(e, "Updating booking status"))?;
    debug!("Changed status to {}", new_status.as_str());

    // Status notifications are best-effort; pending gets none.
    if let Some(user) = user {
        let email = user.email.clone();
        booking.status = new_status;
        let data = crate::routes::booking::localize(booking, Some(user), reference_timezone());
        match new_status {
            BookingStatus::Active => {
                EmailService::send_ride_active_email(&email, &data).await;
            }
            BookingStatus::Completed => {
                EmailService::send_ride_completed_email(&email, &data).await;
            }
            BookingStatus::Cancelled => {
                EmailService::send_ride_cancelled_email(&email, &data).await;
            }
            BookingStatus::Pending => {}
        }
    }

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "status": new_status.as_str() }),
    )))
}

/// --------------------
/// Aggregate analytics
/// --------------------
#[get("/admin/booking/analytics")]
pub async fn booking_analytics(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Analysis>>, ApiError> {
    auth.ensure_admin()?;

    let mut cursor = db
        .collection::<Booking>("bookings")
        .find(None, None)
        .await
        .map_err(|e| translate_db_error(e, "Booking analytics"))?;

    let mut total_bookings = 0i64;
    let mut completed_rides = 0i64;
    let mut total_revenue = 0f64;

    while cursor
        .advance()
        .await
        .map_err(|e| translate_db_error(e, "Booking analytics"))?
    {
        let booking: Booking = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;

        total_bookings += 1;
        if booking.status == BookingStatus::Completed {
            completed_rides += 1;
            total_revenue += booking.total_price;
        }
    }

    Ok(Json(ApiResponse::success(Analysis {
        total_bookings,
        completed_rides,
        total_revenue,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    fn seeded_admin(password: Option<&str>) -> Admin {
        Admin {
            id: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: password.map(str::to_string),
        }
    }

    fn register_dto(first_name: &str, last_name: &str) -> RegisterAdminDto {
        RegisterAdminDto {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: "ada@example.com".to_string(),
            password: "Abc123".to_string(),
            confirm_password: "Abc123".to_string(),
        }
    }

    #[test]
    fn unregistered_admin_with_matching_names_passes() {
        let admin = seeded_admin(None);
        assert!(registration_gate(&admin, &register_dto("Ada", "Lovelace")).is_ok());
    }

    #[test]
    fn name_mismatch_on_unregistered_admin_is_not_found() {
        let admin = seeded_admin(None);
        let err = registration_gate(&admin, &register_dto("Grace", "Hopper")).unwrap_err();
        assert_eq!(err.status, Status::NotFound);
    }

    #[test]
    fn registered_admin_is_forbidden_even_with_wrong_names() {
        let admin = seeded_admin(Some("$2b$12$digest"));
        let err = registration_gate(&admin, &register_dto("Grace", "Hopper")).unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
    }
}
