//! Integration tests for duplicate detection and the spam guard

mod common;

use chrono::Duration;
use citycare::config::EngineConfig;
use citycare::geo::haversine_m;
use citycare::models::UserId;
use citycare::{Coordinates, CoreError};
use common::*;
use proptest::prelude::*;

#[test]
fn test_nearest_primary_wins() {
    let h = harness();
    // Two primaries ~80 m apart; the report lands ~15 m from the second.
    let west = h.service.submit(&citizen(11), submission(12.9716, 77.5940)).unwrap().complaint;
    let east = h.service.submit(&citizen(12), submission(12.9716, 77.59474)).unwrap().complaint;
    assert_ne!(west.id, east.id);

    let report = h.service.submit(&citizen(13), submission(12.9716, 77.5946)).unwrap();
    assert!(report.is_duplicate);
    assert_eq!(report.complaint.id, east.id);
}

#[test]
fn test_equidistant_tie_goes_to_earliest() {
    let h = harness();
    // Offsets are powers of two so both distances are bit-identical.
    let step = 1.0 / 4096.0;
    let first = h.service.submit(&citizen(11), submission(0.0, 10.0 - step)).unwrap().complaint;
    h.clock.advance(Duration::minutes(1));
    let second = h.service.submit(&citizen(12), submission(0.0, 10.0 + step)).unwrap().complaint;
    assert_ne!(first.id, second.id);

    let midpoint = h.service.submit(&citizen(13), submission(0.0, 10.0)).unwrap();
    assert!(midpoint.is_duplicate);
    assert_eq!(midpoint.complaint.id, first.id);
}

#[test]
fn test_radius_is_inclusive_of_boundary_neighbourhood() {
    let h = harness();
    // Straddles a grid cell boundary at 77.60.
    let a = h.service.submit(&citizen(11), submission(12.9716, 77.59998)).unwrap().complaint;
    let b = h.service.submit(&citizen(12), submission(12.9716, 77.60010)).unwrap();
    assert!(haversine_m(a.coordinates, b.complaint.coordinates) < 50.0);
    assert!(b.is_duplicate);
}

#[test]
fn test_antimeridian_neighbours_merge() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(0.0, 179.9999)).unwrap().complaint;
    let b = h.service.submit(&citizen(12), submission(0.0, -179.9999)).unwrap();
    assert!(b.is_duplicate);
    assert_eq!(b.complaint.id, a.id);
}

#[test]
fn test_reports_on_the_antimeridian_merge() {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(0.5, 180.0)).unwrap();
    let b = h.service.submit(&citizen(12), submission(0.5, 180.0)).unwrap();
    assert!(!a.is_duplicate);
    assert!(b.is_duplicate);
    assert_eq!(b.complaint.id, a.complaint.id);

    let c = h.service.submit(&citizen(13), submission(0.5, -180.0)).unwrap();
    assert!(c.is_duplicate);
    assert_eq!(h.service.store().len().unwrap(), 1);
}

#[test]
fn test_max_age_limits_merging() {
    let settings = EngineConfig {
        duplicate_max_age_hours: Some(24),
        ..EngineConfig::default()
    };
    let h = harness_with(settings);
    let old = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap().complaint;
    h.clock.advance(Duration::hours(25));

    let fresh = h.service.submit(&citizen(12), submission(12.9716, 77.5946)).unwrap();
    assert!(!fresh.is_duplicate);
    assert_ne!(fresh.complaint.id, old.id);
}

#[test]
fn test_spam_guard_limits_repeat_reports() {
    let h = harness();
    for _ in 0..5 {
        h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap();
    }
    let err = h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap_err();
    assert!(matches!(err, CoreError::RateLimited(_)));

    // Other users are unaffected, and the window expires.
    assert!(h.service.submit(&citizen(12), submission(12.9716, 77.5946)).is_ok());
    h.clock.advance(Duration::hours(1) + Duration::seconds(1));
    assert!(h.service.submit(&citizen(11), submission(12.9716, 77.5946)).is_ok());

    let primary = h.service.list_complaints(&Default::default()).unwrap();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].urgency_level, 7);
}

#[test]
fn test_spam_guard_can_be_disabled() {
    let settings = EngineConfig {
        spam_limit: 0,
        ..EngineConfig::default()
    };
    let h = harness_with(settings);
    for _ in 0..8 {
        h.service.submit(&citizen(11), submission(12.9716, 77.5946)).unwrap();
    }
    let all = h.service.list_complaints(&Default::default()).unwrap();
    assert_eq!(all[0].urgency_level, 8);
    assert_eq!(all[0].complainant, UserId(11));
}

#[test]
fn test_invalid_submissions_are_rejected() {
    let h = harness();
    let mut no_photo = submission(12.9716, 77.5946);
    no_photo.photo_before.clear();
    assert!(matches!(h.service.submit(&citizen(11), no_photo), Err(CoreError::Validation(_))));

    assert!(matches!(
        h.service.submit(&citizen(11), submission(91.0, 0.0)),
        Err(CoreError::Validation(_))
    ));
    assert!(h.service.store().is_empty().unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_merge_iff_within_radius(dlat in -0.0008f64..0.0008, dlon in -0.0008f64..0.0008) {
        let h = harness();
        let origin = Coordinates::new(12.9716, 77.5946);
        let other = Coordinates::new(origin.lat + dlat, origin.lon + dlon);
        let distance = haversine_m(origin, other);
        // Float noise right at the boundary is not interesting.
        prop_assume!((distance - 50.0).abs() > 0.01);

        let first = h.service.submit(&citizen(11), submission(origin.lat, origin.lon)).unwrap();
        let second = h.service.submit(&citizen(12), submission(other.lat, other.lon)).unwrap();

        prop_assert_eq!(second.is_duplicate, distance <= 50.0);
        if second.is_duplicate {
            prop_assert_eq!(second.complaint.id, first.complaint.id);
            prop_assert_eq!(second.complaint.urgency_level, 2);
        } else {
            prop_assert_eq!(second.complaint.urgency_level, 1);
            prop_assert_eq!(h.service.store().len().unwrap(), 2);
        }
    }

    #[test]
    fn prop_haversine_is_symmetric(
        lat_a in -89.0f64..89.0, lon_a in -180.0f64..180.0,
        lat_b in -89.0f64..89.0, lon_b in -180.0f64..180.0,
    ) {
        let a = Coordinates::new(lat_a, lon_a);
        let b = Coordinates::new(lat_b, lon_b);
        let ab = haversine_m(a, b);
        prop_assert!((ab - haversine_m(b, a)).abs() < 1e-6);
        prop_assert!(ab >= 0.0);
        prop_assert!(ab <= std::f64::consts::PI * 6_371_000.0 + 1.0);
    }
}
