use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, DateTime, oid::ObjectId};
use mongodb::options::FindOptions;
use chrono_tz::Tz;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    Booking, BookingResponse, BookingStatus, RequestBookingDto, Role, User,
};
use crate::services::{geo, EmailService};
use crate::utils::{translate_db_error, ApiError, ApiResponse};

/// Reference timezone bookings are presented in. Storage stays UTC.
pub fn reference_timezone() -> Tz {
    crate::config::Config::booking_timezone()
        .parse()
        .unwrap_or(chrono_tz::America::Chicago)
}

/// Convert a stored RFC 3339 timestamp to the reference timezone. The
/// instant is unchanged; only the offset representation moves. Unparseable
/// values pass through untouched.
fn to_local_time(stored: &str, tz: Tz) -> String {
    match chrono::DateTime::parse_from_rfc3339(stored) {
        Ok(instant) => instant.with_timezone(&tz).to_rfc3339(),
        Err(_) => stored.to_string(),
    }
}

/// Single presentation-layer conversion point for booking timestamps.
pub fn localize(booking: Booking, user: Option<User>, tz: Tz) -> BookingResponse {
    BookingResponse {
        id: booking.id.map(|id| id.to_hex()).unwrap_or_default(),
        users: user.map(Into::into),
        service_type: booking.service_type,
        pickup_time: booking.pickup_time.map(|t| to_local_time(&t, tz)),
        dropoff_time: booking.dropoff_time.map(|t| to_local_time(&t, tz)),
        pickup_location: booking.pickup_location,
        dropoff_location: booking.dropoff_location,
        pickup_type: booking.pickup_type,
        hours: booking.hours,
        total_price: booking.total_price,
        status: booking.status,
        is_approved: booking.is_approved,
        notes: booking.notes,
        created_at: booking
            .created_at
            .try_to_rfc3339_string()
            .unwrap_or_default(),
    }
}

/// Fetch a booking together with its owning user.
pub async fn fetch_joined(
    db: &DbConn,
    booking_id: ObjectId,
) -> Result<Option<(Booking, Option<User>)>, ApiError> {
    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": booking_id }, None)
        .await
        .map_err(|e| translate_db_error(e, "Fetching booking"))?;

    let Some(booking) = booking else {
        return Ok(None);
    };

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": booking.user_id }, None)
        .await
        .map_err(|e| translate_db_error(e, "Fetching booking user"))?;

    Ok(Some((booking, user)))
}

/// Resolve the booking's user by email, creating a rider row when absent.
async fn resolve_user(
    db: &DbConn,
    details: &crate::models::UserCreateDto,
) -> Result<ObjectId, ApiError> {
    let users = db.collection::<User>("users");

    debug!("Verifying user email {}", details.email);
    let existing = users
        .find_one(doc! { "email": &details.email }, None)
        .await
        .map_err(|e| translate_db_error(e, "Resolving user"))?;

    if let Some(user) = existing {
        return user
            .id
            .ok_or_else(|| ApiError::internal_error("User row has no id"));
    }

    debug!("Creating user since absent: {}", details.email);
    let user = User {
        id: None,
        first_name: details.first_name.clone(),
        last_name: details.last_name.clone(),
        email: details.email.clone(),
        phone: details.phone.clone(),
        password: None,
        role: Role::Rider,
        is_verified: false,
        created_at: DateTime::now(),
    };

    let res = users
        .insert_one(&user, None)
        .await
        .map_err(|e| translate_db_error(e, "Resolving user"))?;

    res.inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Insert returned no id"))
}

/// --------------------
/// Create booking
/// --------------------
#[post("/book", data = "<dto>")]
pub async fn request_booking(
    db: &State<DbConn>,
    dto: Json<RequestBookingDto>,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let dto = dto.into_inner();
    dto.validate()?;

    let details = dto
        .users
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("User details are required"))?;
    let user_id = resolve_user(db, details).await?;

    let (total_price, pickup_time, dropoff_time) = if dto.service_type.is_distance_priced() {
        let (Some(pickup), Some(dropoff), Some(start)) = (
            dto.pickup_location_coordinates,
            dto.dropoff_location_coordinates,
            dto.pickup_time,
        ) else {
            return Err(ApiError::bad_request(
                "Valid pickup and dropoff coordinates are required",
            ));
        };

        let miles = geo::distance_miles(&pickup, &dropoff);
        let duration = geo::estimate_duration_seconds(miles);
        let total_price = geo::price_for_distance(miles);
        let eta = start + chrono::Duration::milliseconds((duration * 1000.0) as i64);

        debug!(
            "Priced {:.2} miles at {:.2}, ETA {:.0}s after pickup",
            miles, total_price, duration
        );

        (
            total_price,
            Some(start.to_rfc3339()),
            Some(eta.to_rfc3339()),
        )
    } else {
        let hours = dto
            .hours
            .ok_or_else(|| ApiError::bad_request("hours is required"))?;
        let total_price = geo::price_for_hours(hours);
        debug!("Total price for {} hour(s): {:.2}", hours, total_price);

        // Hourly rides have no computed dropoff.
        (total_price, dto.pickup_time.map(|t| t.to_rfc3339()), None)
    };

    let booking = Booking {
        id: None,
        user_id,
        service_type: dto.service_type,
        pickup_time,
        dropoff_time,
        pickup_location: dto.pickup_location,
        dropoff_location: dto.dropoff_location,
        pickup_type: dto.pickup_type,
        hours: dto.hours,
        total_price,
        status: BookingStatus::Pending,
        is_approved: false,
        notes: dto.notes,
        created_at: DateTime::now(),
    };

    let res = db
        .collection::<Booking>("bookings")
        .insert_one(&booking, None)
        .await
        .map_err(|e| translate_db_error(e, "Creating booking"))?;

    let booking_id = res
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Insert returned no id"))?;

    let (booking, user) = fetch_joined(db, booking_id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Created booking not found"))?;

    let data = localize(booking, user, reference_timezone());
    Ok(Json(ApiResponse::success_with_message("success", data)))
}

/// --------------------
/// Approve / reject price
/// --------------------
#[patch("/book?<id>&<is_approve>")]
pub async fn approve_price(
    db: &State<DbConn>,
    id: &str,
    is_approve: Option<bool>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let booking_id =
        ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid booking id"))?;
    let approved = is_approve.unwrap_or(false);

    debug!("Approving booking {}...", id);
    db.collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": booking_id },
            doc! { "$set": { "is_approved": approved } },
            None,
        )
        .await
        .map_err(|e| translate_db_error(e, "Approving booking"))?;

    if !approved {
        debug!("Ride not approved");
        return Ok(Json(ApiResponse::success(
            serde_json::json!({ "is_approved": approved }),
        )));
    }

    let (booking, user) = fetch_joined(db, booking_id)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no bookings at this id"))?;

    let rider_email = user.as_ref().map(|u| u.email.clone());
    let data = localize(booking, user, reference_timezone());

    // Notifications are best-effort and never block the approval.
    if let Some(email) = rider_email {
        EmailService::send_new_ride_email(&email, &data).await;
    }
    EmailService::send_admin_booking_email(&data).await;

    debug!("Ride approved");
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "is_approved": approved }),
    )))
}

/// --------------------
/// List bookings (role-scoped)
/// --------------------
#[get("/book/all")]
pub async fn get_all_bookings(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, ApiError> {
    let filter = if auth.role == Role::Rider {
        doc! { "user_id": auth.user_id }
    } else {
        // Drivers do not get the all-bookings view.
        auth.ensure_admin()?;
        doc! {}
    };

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = db
        .collection::<Booking>("bookings")
        .find(filter, options)
        .await
        .map_err(|e| translate_db_error(e, "Getting all bookings"))?;

    let mut bookings = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| translate_db_error(e, "Getting all bookings"))?
    {
        let booking = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        bookings.push(booking);
    }

    if auth.role == Role::Rider && bookings.is_empty() {
        debug!("No bookings for rider {}", auth.user_id);
        return Err(ApiError::not_found("There is no bookings at this id"));
    }

    let tz = reference_timezone();
    let users = db.collection::<User>("users");
    let mut data = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let user = users
            .find_one(doc! { "_id": booking.user_id }, None)
            .await
            .map_err(|e| translate_db_error(e, "Getting all bookings"))?;
        data.push(localize(booking, user, tz));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Successfully fetched booking",
        data,
    )))
}

/// --------------------
/// Single booking
/// --------------------
#[get("/book/<booking_id>")]
pub async fn get_booking(
    db: &State<DbConn>,
    _auth: AuthGuard,
    booking_id: &str,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let oid = ObjectId::parse_str(booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking id"))?;

    let (booking, user) = fetch_joined(db, oid)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no bookings at this id"))?;

    let data = localize(booking, user, reference_timezone());
    Ok(Json(ApiResponse::success_with_message(
        "Successfully fetched booking",
        data,
    )))
}

/// --------------------
/// Unscoped listing — intentionally removed
/// --------------------
#[get("/book")]
pub async fn list_bookings_disabled(
) -> Result<Json<ApiResponse<Vec<BookingResponse>>>, ApiError> {
    Err(ApiError::gone("Not available for use"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localization_preserves_the_instant() {
        let stored = "2025-06-01T18:30:00+00:00";
        let local = to_local_time(stored, chrono_tz::America::Chicago);

        let before = chrono::DateTime::parse_from_rfc3339(stored).unwrap();
        let after = chrono::DateTime::parse_from_rfc3339(&local).unwrap();
        assert_eq!(before.timestamp(), after.timestamp());
        // June is CDT, UTC-5.
        assert!(local.contains("-05:00"), "got {}", local);
    }

    #[test]
    fn winter_dates_use_standard_time() {
        let local = to_local_time("2025-01-15T12:00:00+00:00", chrono_tz::America::Chicago);
        assert!(local.contains("-06:00"), "got {}", local);
    }

    #[test]
    fn unparseable_timestamps_pass_through() {
        assert_eq!(
            to_local_time("not-a-time", chrono_tz::America::Chicago),
            "not-a-time"
        );
    }

    #[test]
    fn default_reference_timezone_is_chicago() {
        assert_eq!(reference_timezone(), chrono_tz::America::Chicago);
    }
}
