//! RSSI-based distance estimation.
//!
//! Maps an advertisement's transmit-power hint to an empirically calibrated
//! "measured RSSI at one meter", then converts a received RSSI into meters
//! with the log-distance path loss model.

/// Measured RSSI at one meter for the default transmit-power bucket.
pub const MEASURED_RSSI_AT_ONE_METER_DEFAULT: f64 = -57.0;

/// Distance returned for invalid input.
pub const INVALID_DISTANCE: f64 = -1.0;

/// Derive the measured RSSI at one meter from the advertised transmit-power
/// level.
///
/// Devices that omit the field are observed to transmit at level 11, or 12
/// when the peer is hinted to be an Android one. Android peers report
/// negative levels far below the nominal -3..20 range, meaning transmission
/// at `20 - |level|`.
pub fn measured_rssi_at_one_meter(tx_power_level: Option<i32>, hint_is_android: bool) -> f64 {
    let mut level = match tx_power_level {
        Some(level) => level,
        None => {
            if hint_is_android {
                12
            } else {
                11
            }
        }
    };
    if level < 0 {
        level = 20 + level;
    }

    // Buckets averaged from measurements across handsets advertising at
    // different power levels.
    if level >= 12 {
        MEASURED_RSSI_AT_ONE_METER_DEFAULT
    } else if level >= 9 {
        -71.0
    } else {
        -86.0
    }
}

/// Estimate the distance in meters from a received RSSI.
///
/// `environmental_factor` is the path-loss exponent, valid in [2.0, 4.0].
/// Returns [`INVALID_DISTANCE`] when `rssi >= 20` or the factor is out of
/// range.
pub fn estimated_distance_meters(
    rssi: f64,
    measured_rssi_at_one_meter: f64,
    environmental_factor: f64,
) -> f64 {
    if rssi >= 20.0 {
        return INVALID_DISTANCE;
    }
    if !(2.0..=4.0).contains(&environmental_factor) {
        return INVALID_DISTANCE;
    }
    10f64.powf((measured_rssi_at_one_meter - rssi) / (10.0 * environmental_factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_buckets() {
        assert_eq!(measured_rssi_at_one_meter(Some(20), false), -57.0);
        assert_eq!(measured_rssi_at_one_meter(Some(12), false), -57.0);
        assert_eq!(measured_rssi_at_one_meter(Some(11), false), -71.0);
        assert_eq!(measured_rssi_at_one_meter(Some(9), false), -71.0);
        assert_eq!(measured_rssi_at_one_meter(Some(8), false), -86.0);
        assert_eq!(measured_rssi_at_one_meter(Some(-3), false), -86.0);
    }

    #[test]
    fn test_missing_power_uses_platform_default() {
        // Level 11 without the Android hint, level 12 with it.
        assert_eq!(measured_rssi_at_one_meter(None, false), -71.0);
        assert_eq!(measured_rssi_at_one_meter(None, true), -57.0);
    }

    #[test]
    fn test_negative_android_encoding_is_normalized() {
        // -8 means transmitting at 20 - 8 = 12.
        assert_eq!(measured_rssi_at_one_meter(Some(-8), false), -57.0);
        // -10 means 10.
        assert_eq!(measured_rssi_at_one_meter(Some(-10), false), -71.0);
        // -15 means 5.
        assert_eq!(measured_rssi_at_one_meter(Some(-15), false), -86.0);
    }

    #[test]
    fn test_distance_at_measured_rssi_is_one_meter() {
        let distance = estimated_distance_meters(-57.0, -57.0, 2.0);
        assert!((distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_grows_as_signal_weakens() {
        let near = estimated_distance_meters(-60.0, -57.0, 2.0);
        let far = estimated_distance_meters(-80.0, -57.0, 2.0);
        assert!(near < far);
        // 20 dB of extra loss at exponent 2 is a 10x distance ratio.
        assert!((far / near - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_rssi_returns_sentinel() {
        assert_eq!(estimated_distance_meters(20.0, -57.0, 2.0), INVALID_DISTANCE);
        assert_eq!(estimated_distance_meters(35.0, -57.0, 2.0), INVALID_DISTANCE);
    }

    #[test]
    fn test_out_of_range_environmental_factor_returns_sentinel() {
        assert_eq!(estimated_distance_meters(-60.0, -57.0, 1.9), INVALID_DISTANCE);
        assert_eq!(estimated_distance_meters(-60.0, -57.0, 4.1), INVALID_DISTANCE);
        assert_ne!(estimated_distance_meters(-60.0, -57.0, 4.0), INVALID_DISTANCE);
    }
}
