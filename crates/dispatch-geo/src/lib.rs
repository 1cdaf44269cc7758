//! dispatch-geo
//!
//! Pure, I/O-free vendor ranking: haversine great-circle
//! distance, stable ascending sort, missing-coordinate vendors sorted to
//! the end, and exclusion-set filtering.

use std::collections::HashSet;

use dispatch_schemas::VendorBackend;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A vendor with its computed distance from the pickup. `None` means the
/// vendor (or the pickup) is missing coordinates — sorts to the end.
#[derive(Debug, Clone)]
pub struct RankedVendor {
    pub vendor: VendorBackend,
    pub distance_km: Option<f64>,
}

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Rank `vendors` by great-circle distance from `(pickup_lat, pickup_lon)`,
/// ascending, stable. Vendors with missing coordinates (or a pickup with
/// missing coordinates) sort to the end, in their original relative order.
pub fn rank(
    pickup_lat: Option<f64>,
    pickup_lon: Option<f64>,
    vendors: Vec<VendorBackend>,
) -> Vec<RankedVendor> {
    let mut ranked: Vec<RankedVendor> = vendors
        .into_iter()
        .map(|vendor| {
            let distance_km = match (pickup_lat, pickup_lon, vendor.latitude, vendor.longitude) {
                (Some(plat), Some(plon), Some(vlat), Some(vlon)) => {
                    Some(haversine_km(plat, plon, vlat, vlon))
                }
                _ => None,
            };
            RankedVendor { vendor, distance_km }
        })
        .collect();

    // Stable sort; `None` (treated as +infinity) sorts last.
    ranked.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    ranked
}

/// Remove every vendor whose `vendor_ref` is in `excluded` (the union of
/// caller-supplied `skip_refs`, persisted rejections, and in-memory
/// session rejections).
pub fn exclude(ranked: Vec<RankedVendor>, excluded: &HashSet<String>) -> Vec<RankedVendor> {
    ranked
        .into_iter()
        .filter(|r| !excluded.contains(&r.vendor.vendor_ref))
        .collect()
}

/// Convenience: rank then exclude in one call, as the Dispatch Engine uses it.
pub fn rank_candidates(
    pickup_lat: Option<f64>,
    pickup_lon: Option<f64>,
    vendors: Vec<VendorBackend>,
    excluded: &HashSet<String>,
) -> Vec<RankedVendor> {
    exclude(rank(pickup_lat, pickup_lon, vendors), excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vendor(vendor_ref: &str, lat: Option<f64>, lon: Option<f64>) -> VendorBackend {
        VendorBackend {
            vendor_ref: vendor_ref.to_string(),
            offer_url: format!("https://{vendor_ref}.example/api/offer"),
            latitude: lat,
            longitude: lon,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_zero_distance_for_same_point() {
        assert!((haversine_km(12.97, 77.59, 12.97, 77.59)).abs() < 1e-9);
    }

    #[test]
    fn spec_scenario_1_ranking_order() {
        // Pickup at (12.97, 77.59); V1@(12.98,77.60), V2@(12.96,77.58), V3@(13.00,77.62).
        // Expected ranking: V2, V1, V3.
        let vendors = vec![
            vendor("V1", Some(12.98), Some(77.60)),
            vendor("V2", Some(12.96), Some(77.58)),
            vendor("V3", Some(13.00), Some(77.62)),
        ];
        let ranked = rank(Some(12.97), Some(77.59), vendors);
        let order: Vec<&str> = ranked.iter().map(|r| r.vendor.vendor_ref.as_str()).collect();
        assert_eq!(order, vec!["V2", "V1", "V3"]);
    }

    #[test]
    fn vendors_missing_coordinates_sort_last() {
        let vendors = vec![
            vendor("no-coords", None, None),
            vendor("far", Some(20.0), Some(80.0)),
            vendor("near", Some(12.971), Some(77.591)),
        ];
        let ranked = rank(Some(12.97), Some(77.59), vendors);
        let order: Vec<&str> = ranked.iter().map(|r| r.vendor.vendor_ref.as_str()).collect();
        assert_eq!(order, vec!["near", "far", "no-coords"]);
        assert!(ranked.last().unwrap().distance_km.is_none());
    }

    #[test]
    fn pickup_missing_coordinates_all_sort_equal() {
        let vendors = vec![
            vendor("a", Some(1.0), Some(1.0)),
            vendor("b", Some(2.0), Some(2.0)),
        ];
        let ranked = rank(None, None, vendors);
        assert!(ranked.iter().all(|r| r.distance_km.is_none()));
        // Stable: original relative order preserved.
        let order: Vec<&str> = ranked.iter().map(|r| r.vendor.vendor_ref.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn exclusion_set_removes_vendors() {
        let vendors = vec![
            vendor("V1", Some(12.98), Some(77.60)),
            vendor("V2", Some(12.96), Some(77.58)),
        ];
        let mut excluded = HashSet::new();
        excluded.insert("V2".to_string());
        let ranked = rank_candidates(Some(12.97), Some(77.59), vendors, &excluded);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].vendor.vendor_ref, "V1");
    }
}
