use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::models::{UserCreateDto, UserResponse};
use crate::utils::ApiError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum ServiceType {
    #[serde(rename = "drop-off")]
    DropOff,
    #[serde(rename = "airport-service")]
    AirportService,
    #[serde(rename = "hourly")]
    Hourly,
}

impl ServiceType {
    /// Drop-off and airport rides are priced by distance; hourly is not.
    pub fn is_distance_priced(&self) -> bool {
        matches!(self, ServiceType::DropOff | ServiceType::AirportService)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::DropOff => "drop-off",
            ServiceType::AirportService => "airport-service",
            ServiceType::Hourly => "hourly",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AirportType {
    FromAirport,
    ToAirport,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Completed is terminal: no transition away from it is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed)
    }

    /// A terminal status only admits the no-op transition back to itself.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        !self.is_terminal() || next == BookingStatus::Completed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, JsonSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub service_type: ServiceType,
    /// RFC 3339, stored in UTC; converted to the reference timezone only at
    /// the response boundary.
    pub pickup_time: Option<String>,
    pub dropoff_time: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
    pub pickup_type: Option<AirportType>,
    pub hours: Option<f64>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub is_approved: bool,
    pub notes: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RequestBookingDto {
    pub users: Option<UserCreateDto>,
    pub service_type: ServiceType,
    pub pickup_time: Option<chrono::DateTime<chrono::Utc>>,
    pub pickup_location: Option<String>,
    pub pickup_location_coordinates: Option<Coordinates>,
    pub dropoff_location: Option<String>,
    pub dropoff_location_coordinates: Option<Coordinates>,
    pub pickup_type: Option<AirportType>,
    pub hours: Option<f64>,
    pub notes: Option<String>,
}

impl RequestBookingDto {
    /// Service-specific field validation, enforced before any pricing runs.
    pub fn validate(&self) -> Result<(), ApiError> {
        match self.service_type {
            ServiceType::AirportService if self.pickup_type.is_none() => {
                return Err(ApiError::bad_request(
                    "Airport service selected but no follow up data provided",
                ));
            }
            ServiceType::Hourly => match self.hours {
                Some(h) if h.is_finite() && h > 0.0 => {}
                _ => {
                    return Err(ApiError::bad_request(
                        "Hourly service selected but no follow up data provided",
                    ));
                }
            },
            _ => {}
        }

        if self.service_type.is_distance_priced() {
            if self.pickup_time.is_none() {
                return Err(ApiError::bad_request("pickup_time is required"));
            }
            match (
                &self.pickup_location_coordinates,
                &self.dropoff_location_coordinates,
            ) {
                (Some(p), Some(d)) if p.is_valid() && d.is_valid() => {}
                _ => {
                    return Err(ApiError::bad_request(
                        "Valid pickup and dropoff coordinates are required",
                    ));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateStatusDto {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingResponse {
    pub id: String,
    pub users: Option<UserResponse>,
    pub service_type: ServiceType,
    pub pickup_time: Option<String>,
    pub dropoff_time: Option<String>,
    pub pickup_location: Option<String>,
    pub dropoff_location: Option<String>,
    pub pickup_type: Option<AirportType>,
    pub hours: Option<f64>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub is_approved: bool,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Analysis {
    pub total_bookings: i64,
    pub completed_rides: i64,
    pub total_revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_dto(service_type: ServiceType) -> RequestBookingDto {
        RequestBookingDto {
            users: None,
            service_type,
            pickup_time: Some(chrono::Utc::now()),
            pickup_location: Some("A".into()),
            pickup_location_coordinates: Some(Coordinates { lat: 41.8, lon: -87.6 }),
            dropoff_location: Some("B".into()),
            dropoff_location_coordinates: Some(Coordinates { lat: 42.0, lon: -87.9 }),
            pickup_type: Some(AirportType::ToAirport),
            hours: Some(2.0),
            notes: None,
        }
    }

    #[test]
    fn completed_is_the_only_terminal_status() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Active.is_terminal());
        assert!(!BookingStatus::Cancelled.is_terminal());
    }

    #[test]
    fn completed_only_transitions_back_to_completed() {
        assert!(BookingStatus::Completed.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Active));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn non_terminal_statuses_transition_freely() {
        for current in [
            BookingStatus::Pending,
            BookingStatus::Active,
            BookingStatus::Cancelled,
        ] {
            for next in [
                BookingStatus::Pending,
                BookingStatus::Active,
                BookingStatus::Completed,
                BookingStatus::Cancelled,
            ] {
                assert!(current.can_transition_to(next));
            }
        }
    }

    #[test]
    fn service_type_wire_names_use_hyphens() {
        assert_eq!(
            serde_json::to_string(&ServiceType::DropOff).unwrap(),
            "\"drop-off\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceType::AirportService).unwrap(),
            "\"airport-service\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceType::Hourly).unwrap(),
            "\"hourly\""
        );
    }

    #[test]
    fn airport_service_requires_pickup_type() {
        let mut dto = base_dto(ServiceType::AirportService);
        assert!(dto.validate().is_ok());
        dto.pickup_type = None;
        assert!(dto.validate().is_err());
    }

    #[test]
    fn hourly_requires_positive_finite_hours() {
        let mut dto = base_dto(ServiceType::Hourly);
        assert!(dto.validate().is_ok());
        dto.hours = None;
        assert!(dto.validate().is_err());
        dto.hours = Some(0.0);
        assert!(dto.validate().is_err());
        dto.hours = Some(f64::NAN);
        assert!(dto.validate().is_err());
    }

    #[test]
    fn priced_services_require_valid_coordinates() {
        let mut dto = base_dto(ServiceType::DropOff);
        assert!(dto.validate().is_ok());

        dto.dropoff_location_coordinates = None;
        assert!(dto.validate().is_err());

        dto.dropoff_location_coordinates = Some(Coordinates { lat: 95.0, lon: 0.0 });
        assert!(dto.validate().is_err());

        dto.dropoff_location_coordinates = Some(Coordinates {
            lat: f64::NAN,
            lon: 0.0,
        });
        assert!(dto.validate().is_err());
    }

    #[test]
    fn priced_services_require_pickup_time() {
        let mut dto = base_dto(ServiceType::AirportService);
        dto.pickup_time = None;
        assert!(dto.validate().is_err());
    }

    #[test]
    fn hourly_skips_the_coordinate_requirement() {
        let mut dto = base_dto(ServiceType::Hourly);
        dto.pickup_location_coordinates = None;
        dto.dropoff_location_coordinates = None;
        assert!(dto.validate().is_ok());
    }
}
