//! Duration unit conversion for hold specifications.

/// Converts a value between named units.
pub trait UnitConverter {
    /// Returns `None` when either unit is unknown or the units are incompatible.
    fn convert(&self, value: f64, from: &str, to: &str) -> Option<f64>;
}

/// Built-in table of time units.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeUnits;

impl TimeUnits {
    /// Seconds per unit.
    fn scale(unit: &str) -> Option<f64> {
        let scale = match unit {
            "ms" | "msec" | "millisecond" | "milliseconds" => 0.001,
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
            "d" | "day" | "days" => 86400.0,
            "w" | "wk" | "week" | "weeks" => 604800.0,
            _ => return None,
        };
        Some(scale)
    }
}

impl UnitConverter for TimeUnits {
    fn convert(&self, value: f64, from: &str, to: &str) -> Option<f64> {
        let from = Self::scale(from)?;
        let to = Self::scale(to)?;
        Some(value * from / to)
    }
}
