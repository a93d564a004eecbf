use proptest::prelude::*;

use crate::control::volume::Volume;

#[test]
fn test_volume_percent() {
    let vol = Volume::from_percent(50.0);
    assert!((vol.as_f64() - 0.5).abs() < f64::EPSILON);
    assert_eq!(vol.as_percent(), 50);

    assert_eq!(Volume::new(0.42).as_percent(), 42);
    assert_eq!(Volume::from_percent(0.0), Volume::MIN);
}

#[test]
fn test_volume_clamping() {
    assert_eq!(Volume::from_percent(150.0), Volume::MAX);
    assert_eq!(Volume::new(-0.5), Volume::MIN);
    assert_eq!(Volume::new(f64::NAN), Volume::MIN);
}

#[test]
fn test_is_silent() {
    assert!(Volume::MIN.is_silent());
    assert!(Volume::new(0.0005).is_silent());
    assert!(!Volume::new(0.01).is_silent());
}

proptest! {
    #[test]
    fn test_any_percent_stays_in_range(percent in any::<f64>()) {
        let volume = Volume::from_percent(percent);
        prop_assert!((0.0..=1.0).contains(&volume.as_f64()));
        prop_assert!(volume.as_percent() <= 100);
    }

    #[test]
    fn test_whole_percent_survives_conversion(percent in 0u8..=100) {
        let volume = Volume::from_percent(f64::from(percent));
        prop_assert_eq!(volume.as_percent(), percent);
    }
}
