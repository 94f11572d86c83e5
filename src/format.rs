/// Renders a power value for the display.
///
/// The value is rounded to whole watts (ties to even) before anything else,
/// so the threshold check and the thousands path both see the rounded value.
/// Values of a thousand or more keep the " W" suffix with one decimal.
pub fn format_watts(watts: f64) -> String {
    let watts = watts.round_ties_even();
    if watts.abs() < 1000.0 {
        return format!("{} W", watts as i64);
    }
    format!("{:.1} W", watts / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_are_whole_watts() {
        assert_eq!(format_watts(0.0), "0 W");
        assert_eq!(format_watts(-42.0), "-42 W");
        assert_eq!(format_watts(42.4), "42 W");
        assert_eq!(format_watts(-0.4), "0 W");
        assert_eq!(format_watts(999.4), "999 W");
        assert_eq!(format_watts(-999.0), "-999 W");
    }

    #[test]
    fn test_rounding_happens_before_threshold() {
        assert_eq!(format_watts(999.6), "1.0 W");
        assert_eq!(format_watts(-999.5), "-1.0 W");
        assert_eq!(format_watts(999.5), "1.0 W");
    }

    #[test]
    fn test_ties_round_to_even() {
        assert_eq!(format_watts(2.5), "2 W");
        assert_eq!(format_watts(3.5), "4 W");
        assert_eq!(format_watts(-0.5), "0 W");
    }

    #[test]
    fn test_large_values_have_one_decimal() {
        assert_eq!(format_watts(1000.0), "1.0 W");
        assert_eq!(format_watts(-1500.0), "-1.5 W");
        assert_eq!(format_watts(12345.0), "12.3 W");
        assert_eq!(format_watts(4049.7), "4.0 W");
        assert_eq!(format_watts(250_000.0), "250.0 W");
    }

    #[test]
    fn test_threshold_sweep() {
        for watts in (-5000i64..=5000).step_by(7) {
            let rendered = format_watts(watts as f64 + 0.3);
            assert!(rendered.ends_with(" W"));
            let number = rendered.trim_end_matches(" W");
            if watts.abs() < 1000 {
                assert!(!number.contains('.'), "{watts} -> {rendered}");
            } else {
                let (_, fraction) = number.split_once('.').unwrap();
                assert_eq!(fraction.len(), 1, "{watts} -> {rendered}");
            }
        }
    }
}
