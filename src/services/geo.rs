use crate::models::Coordinates;

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Fixed average-speed assumption for ETA estimates.
const AVERAGE_SPEED_MPH: f64 = 45.0;

const PRICE_PER_MILE: f64 = 25.0;
const PRICE_PER_HOUR: f64 = 100.0;

/// Great-circle distance in miles (haversine). Callers must validate the
/// coordinates first; see `Coordinates::is_valid`.
pub fn distance_miles(pickup: &Coordinates, dropoff: &Coordinates) -> f64 {
    let lat1 = pickup.lat.to_radians();
    let lat2 = dropoff.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (dropoff.lon - pickup.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

pub fn estimate_duration_seconds(miles: f64) -> f64 {
    miles / AVERAGE_SPEED_MPH * 3600.0
}

pub fn price_for_distance(miles: f64) -> f64 {
    round2(miles * PRICE_PER_MILE)
}

pub fn price_for_hours(hours: f64) -> f64 {
    round2(hours * PRICE_PER_HOUR)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinates {
        Coordinates { lat, lon }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = coord(41.8781, -87.6298); // Chicago
        let b = coord(42.3601, -71.0589); // Boston
        let d1 = distance_miles(&a, &b);
        let d2 = distance_miles(&b, &a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = coord(41.8781, -87.6298);
        assert_eq!(distance_miles(&a, &a), 0.0);
    }

    #[test]
    fn chicago_to_milwaukee_is_about_80_miles() {
        let chicago = coord(41.8781, -87.6298);
        let milwaukee = coord(43.0389, -87.9065);
        let d = distance_miles(&chicago, &milwaukee);
        assert!((75.0..90.0).contains(&d), "got {}", d);
    }

    #[test]
    fn hundred_miles_prices_at_2500() {
        assert_eq!(price_for_distance(100.0), 2500.00);
    }

    #[test]
    fn hundred_miles_takes_8000_seconds() {
        assert_eq!(estimate_duration_seconds(100.0), 8000.0);
    }

    #[test]
    fn three_hours_prices_at_300() {
        assert_eq!(price_for_hours(3.0), 300.00);
    }

    #[test]
    fn prices_round_to_two_decimals() {
        assert_eq!(price_for_distance(1.2345), 30.86);
        assert_eq!(price_for_hours(1.2345), 123.45);
    }

    #[test]
    fn prices_are_monotonic() {
        let mut last_distance = 0.0;
        let mut last_hours = 0.0;
        for i in 1..200 {
            let x = i as f64 * 0.37;
            let pd = price_for_distance(x);
            let ph = price_for_hours(x);
            assert!(pd >= last_distance);
            assert!(ph >= last_hours);
            last_distance = pd;
            last_hours = ph;
        }
    }
}
