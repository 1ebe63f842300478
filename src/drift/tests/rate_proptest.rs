use proptest::prelude::*;

use crate::drift::DriftMonitor;
use crate::types::SyncConfig;

proptest! {
    #[test]
    fn test_rate_stays_in_bounds(drift_ms in -1.0e7f64..1.0e7) {
        let config = SyncConfig::default();
        let monitor = DriftMonitor::new(&config);
        let rate = monitor.rate_for_drift(drift_ms);

        prop_assert!(rate >= config.min_rate);
        prop_assert!(rate <= config.max_rate);
    }

    #[test]
    fn test_rate_direction_follows_drift(drift_ms in 1.0f64..10_000.0) {
        let monitor = DriftMonitor::new(&SyncConfig::default());

        prop_assert!(monitor.rate_for_drift(drift_ms) > 1.0);
        prop_assert!(monitor.rate_for_drift(-drift_ms) < 1.0);
    }

    #[test]
    fn test_custom_bounds_respected(
        drift_ms in -1.0e6f64..1.0e6,
        min in 0.5f64..1.0,
        max in 1.0f64..2.0,
    ) {
        let config = SyncConfig::builder().rate_nudge(0.1, min, max).build();
        let rate = DriftMonitor::new(&config).rate_for_drift(drift_ms);

        prop_assert!(rate >= min && rate <= max);
    }
}
