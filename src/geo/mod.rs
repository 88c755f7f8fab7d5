use crate::models::room::GeoPoint;

/// Great-circle initial bearing (forward azimuth) from `from` towards `to`,
/// in degrees normalized to [0, 360). Drives map rotation on the tracking
/// views.
pub fn initial_bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::initial_bearing_deg;
    use crate::models::room::GeoPoint;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    #[test]
    fn due_east_is_90_degrees() {
        let bearing = initial_bearing_deg(&p(0.0, 0.0), &p(0.0, 1.0));
        assert!((bearing - 90.0).abs() < 1e-9);
    }

    #[test]
    fn due_north_is_0_degrees() {
        let bearing = initial_bearing_deg(&p(0.0, 0.0), &p(1.0, 0.0));
        assert!(bearing.abs() < 1e-9);
    }

    #[test]
    fn due_west_is_270_degrees() {
        let bearing = initial_bearing_deg(&p(0.0, 0.0), &p(0.0, -1.0));
        assert!((bearing - 270.0).abs() < 1e-9);
    }

    #[test]
    fn invariant_under_uniform_longitude_shift() {
        let base = initial_bearing_deg(&p(6.9, 79.8), &p(6.91, 79.81));
        let shifted = initial_bearing_deg(&p(6.9, 99.8), &p(6.91, 99.81));
        assert!((base - shifted).abs() < 1e-9);
    }

    #[test]
    fn result_stays_in_range() {
        let pairs = [
            (p(6.9, 79.8), p(6.91, 79.81)),
            (p(52.52, 13.405), p(48.85, 2.35)),
            (p(-33.86, 151.2), p(51.5, -0.12)),
            (p(0.0, 179.9), p(0.0, -179.9)),
        ];
        for (from, to) in pairs {
            let bearing = initial_bearing_deg(&from, &to);
            assert!((0.0..360.0).contains(&bearing), "bearing {bearing} out of range");
        }
    }
}
