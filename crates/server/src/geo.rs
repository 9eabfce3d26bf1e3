//! Flat-earth conversions between metres and degrees.
//!
//! The tree stores latitude on its x axis and longitude on its y axis. A
//! neighborhood is the square of views covering a radius around a point,
//! good enough at city scale and away from the poles.

use protocol::{MAX_LAT, MAX_LNG};

use crate::spatial::View;

/// Metres covered by one degree of latitude.
pub const METRES_PER_LAT: f64 = 110_574.0;

/// Metres covered by one degree of longitude at the equator.
pub const METRES_PER_LNG: f64 = 111_312.0;

/// Degrees of latitude spanned by `radius_m` metres.
#[inline]
pub fn lat_span(radius_m: f64) -> f64 {
    radius_m / METRES_PER_LAT
}

/// Degrees of longitude spanned by `radius_m` metres at latitude `lat`.
///
/// Capped at a half turn; at the poles every longitude is in range.
pub fn lng_span(lat: f64, radius_m: f64) -> f64 {
    let metres_per_deg = METRES_PER_LNG * lat.to_radians().cos();
    if metres_per_deg <= f64::EPSILON {
        return MAX_LNG;
    }
    (radius_m / metres_per_deg).min(MAX_LNG)
}

/// Views covering `radius_m` metres around `(lat, lng)`, clipped to `bounds`.
///
/// When `bounds` spans every longitude, the part of the square that runs
/// past the antimeridian is wrapped around to the other edge as an extra
/// view. Returns an empty list if the square misses `bounds` entirely.
pub fn neighborhood(bounds: &View, lat: f64, lng: f64, radius_m: f64) -> Vec<View> {
    let radius_m = radius_m.max(0.0);
    let dlat = lat_span(radius_m);
    let dlng = lng_span(lat, radius_m);
    let (lat_lo, lat_hi) = (lat - dlat, lat + dlat);

    let mut regions = Vec::with_capacity(2);
    let square = View::new(lat_lo, lat_hi, lng - dlng, lng + dlng);
    if let Some(v) = square.intersect(bounds) {
        regions.push(v);
    }

    if bounds.ty() <= -MAX_LNG && bounds.by() >= MAX_LNG {
        let west = lng - dlng;
        if west < -MAX_LNG {
            let wrapped = View::new(lat_lo, lat_hi, west + 2.0 * MAX_LNG, MAX_LNG);
            if let Some(v) = wrapped.intersect(bounds) {
                regions.push(v);
            }
        }
        let east = lng + dlng;
        if east > MAX_LNG {
            let wrapped = View::new(lat_lo, lat_hi, -MAX_LNG, east - 2.0 * MAX_LNG);
            if let Some(v) = wrapped.intersect(bounds) {
                regions.push(v);
            }
        }
    }
    regions
}

/// The whole globe as a tree view.
pub fn globe() -> View {
    View::new(-MAX_LAT, MAX_LAT, -MAX_LNG, MAX_LNG)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_spans() {
        assert!(approx(lat_span(METRES_PER_LAT), 1.0));
        assert!(approx(lng_span(0.0, METRES_PER_LNG), 1.0));
        // Longitude degrees shrink away from the equator.
        assert!(approx(lng_span(60.0, METRES_PER_LNG), 2.0));
        assert_eq!(lng_span(90.0, 1.0), MAX_LNG);
        assert_eq!(lng_span(0.0, 1e12), MAX_LNG);
    }

    #[test]
    fn test_neighborhood_inside() {
        let regions = neighborhood(&globe(), 10.0, 20.0, METRES_PER_LAT);
        assert_eq!(regions.len(), 1);
        let v = regions[0];
        assert!(approx(v.lx(), 9.0) && approx(v.rx(), 11.0));
        assert!(v.contains(10.0, 20.0));
        assert!(v.contains(10.5, 20.5));
        assert!(!v.contains(12.0, 20.0));
    }

    #[test]
    fn test_neighborhood_clipped() {
        let bounds = View::new(0.0, 10.0, 0.0, 10.0);
        let regions = neighborhood(&bounds, 0.5, 0.5, 2.0 * METRES_PER_LAT);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].lx(), 0.0);
        assert_eq!(regions[0].ty(), 0.0);

        assert!(neighborhood(&bounds, 50.0, 50.0, 1.0).is_empty());
    }

    #[test]
    fn test_neighborhood_wraps_antimeridian() {
        let regions = neighborhood(&globe(), 0.0, 179.5, METRES_PER_LNG);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].contains(0.0, 180.0));
        assert!(approx(regions[1].ty(), -180.0));
        assert!(approx(regions[1].by(), -179.5));
        assert!(regions[1].contains(0.0, -179.8));

        let regions = neighborhood(&globe(), 0.0, -179.5, METRES_PER_LNG);
        assert_eq!(regions.len(), 2);
        assert!(regions[1].contains(0.0, 179.8));
    }

    #[test]
    fn test_no_wrap_for_partial_bounds() {
        let bounds = View::new(-90.0, 90.0, 0.0, 180.0);
        let regions = neighborhood(&bounds, 0.0, 179.5, METRES_PER_LNG);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_zero_radius_is_point() {
        let regions = neighborhood(&globe(), 1.0, 2.0, 0.0);
        assert_eq!(regions, vec![View::point(1.0, 2.0)]);
        let regions = neighborhood(&globe(), 1.0, 2.0, f64::NAN);
        assert_eq!(regions, vec![View::point(1.0, 2.0)]);
    }
}
