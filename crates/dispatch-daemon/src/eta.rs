//! ETA computation for `GET /api/pickups/:id`: assumes a 20
//! km/h average vendor travel speed, clamped to a sane [5, 180] minute
//! window so a very close or very far vendor still reports something
//! plausible to the customer.

/// `max(5, min(180, round(distance_km / 20 * 60)))` minutes, or `None` if
/// either point is missing coordinates.
pub fn eta_minutes(
    pickup_lat: Option<f64>,
    pickup_lon: Option<f64>,
    vendor_lat: Option<f64>,
    vendor_lon: Option<f64>,
) -> Option<i64> {
    let (plat, plon, vlat, vlon) = (pickup_lat?, pickup_lon?, vendor_lat?, vendor_lon?);
    let distance_km = dispatch_geo::haversine_km(plat, plon, vlat, vlon);
    let raw_minutes = (distance_km / 20.0 * 60.0).round() as i64;
    Some(raw_minutes.clamp(5, 180))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_coordinates_yields_none() {
        assert_eq!(eta_minutes(None, None, Some(1.0), Some(1.0)), None);
        assert_eq!(eta_minutes(Some(1.0), Some(1.0), None, None), None);
    }

    #[test]
    fn very_close_clamps_to_minimum() {
        let eta = eta_minutes(Some(12.97), Some(77.59), Some(12.9701), Some(77.5901)).unwrap();
        assert_eq!(eta, 5);
    }

    #[test]
    fn very_far_clamps_to_maximum() {
        let eta = eta_minutes(Some(0.0), Some(0.0), Some(40.0), Some(40.0)).unwrap();
        assert_eq!(eta, 180);
    }

    #[test]
    fn mid_range_computes_expected_minutes() {
        // ~37 km apart should be well inside the clamp range.
        let eta = eta_minutes(Some(12.97), Some(77.59), Some(13.30), Some(77.59)).unwrap();
        assert!(eta > 5 && eta < 180);
    }
}
