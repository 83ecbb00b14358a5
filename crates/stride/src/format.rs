//! Display helpers for run statistics.

use crate::models::{METERS_PER_MILE, UnitSystem};

pub const PACE_PLACEHOLDER: &str = "--:--";

/// `H:MM:SS` from one hour on, `MM:SS` below.
pub fn format_elapsed(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

pub fn format_distance(meters: f64, unit: UnitSystem) -> String {
    if meters < 1000.0 {
        return format!("{meters:.0} m");
    }
    match unit {
        UnitSystem::Metric => format!("{:.2} km", meters / 1000.0),
        UnitSystem::Imperial => format!("{:.2} mi", meters / METERS_PER_MILE),
    }
}

/// `pace` is in seconds per unit of `unit`.
pub fn format_pace(pace: Option<f64>, unit: UnitSystem) -> String {
    match pace {
        Some(p) if p.is_finite() && p > 0.0 => {
            let total = p.round() as u64;
            format!("{}:{:02} {}", total / 60, total % 60, unit.pace_label())
        }
        _ => PACE_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0.0), "00:00");
        assert_eq!(format_elapsed(65.7), "01:05");
        assert_eq!(format_elapsed(3599.0), "59:59");
        assert_eq!(format_elapsed(3600.0), "1:00:00");
        assert_eq!(format_elapsed(4.0 * 3600.0 + 7.0 * 60.0 + 3.0), "4:07:03");
        assert_eq!(format_elapsed(-5.0), "00:00");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0, UnitSystem::Metric), "0 m");
        assert_eq!(format_distance(999.4, UnitSystem::Imperial), "999 m");
        assert_eq!(format_distance(5000.0, UnitSystem::Metric), "5.00 km");
        assert_eq!(format_distance(METERS_PER_MILE * 3.0, UnitSystem::Imperial), "3.00 mi");
    }

    #[test]
    fn test_format_pace() {
        assert_eq!(format_pace(Some(300.0), UnitSystem::Metric), "5:00 /km");
        assert_eq!(format_pace(Some(487.4), UnitSystem::Imperial), "8:07 /mi");
        assert_eq!(format_pace(Some(0.0), UnitSystem::Metric), PACE_PLACEHOLDER);
        assert_eq!(format_pace(None, UnitSystem::Imperial), PACE_PLACEHOLDER);
        assert_eq!(format_pace(Some(f64::INFINITY), UnitSystem::Metric), PACE_PLACEHOLDER);
    }
}
