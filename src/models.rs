//! Domain model for a single meter reading. Readings are plain data holders:
//! the store persists them verbatim and the UI formats them for display.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One dated snapshot of the three meter values. Field order here is the field
/// order written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Day.month.year text exactly as entered. Never parsed as a calendar date.
    #[serde(alias = "datum")]
    pub date: String,
    /// Electricity meter, kWh.
    #[serde(alias = "strom")]
    pub electricity: f64,
    /// Gas meter, m³.
    pub gas: f64,
    /// Water meter, m³.
    #[serde(alias = "wasser")]
    pub water: f64,
}

impl Reading {
    pub fn new(date: impl Into<String>, electricity: f64, gas: f64, water: f64) -> Self {
        Self {
            date: date.into(),
            electricity,
            gas,
            water,
        }
    }
}

impl fmt::Display for Reading {
    /// Single-line summary used by the readings list.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Electricity: {} kWh | Gas: {} m³ | Water: {} m³",
            self.date,
            plain_decimal(self.electricity),
            plain_decimal(self.gas),
            plain_decimal(self.water)
        )
    }
}

/// Render a float the way readings have always been shown: whole numbers keep
/// a trailing `.0`, everything else uses the shortest exact representation.
pub fn plain_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_all_three_meters() {
        let reading = Reading::new("01.02.2024", 12345.5, 8765.0, 456.8);
        assert_eq!(
            reading.to_string(),
            "01.02.2024 | Electricity: 12345.5 kWh | Gas: 8765.0 m³ | Water: 456.8 m³"
        );
    }

    #[test]
    fn plain_decimal_keeps_trailing_zero_for_whole_numbers() {
        assert_eq!(plain_decimal(100.0), "100.0");
        assert_eq!(plain_decimal(0.25), "0.25");
        assert_eq!(plain_decimal(-3.0), "-3.0");
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let json = r#"{"datum":"05.06.2023","strom":10.5,"gas":2.0,"wasser":1.25}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading, Reading::new("05.06.2023", 10.5, 2.0, 1.25));
    }

    #[test]
    fn serializes_with_stable_field_order() {
        let reading = Reading::new("01.01.2024", 100.0, 50.0, 10.0);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            json,
            r#"{"date":"01.01.2024","electricity":100.0,"gas":50.0,"water":10.0}"#
        );
    }

    #[test]
    fn record_missing_a_field_is_rejected() {
        let json = r#"{"date":"01.01.2024","electricity":1.0,"gas":2.0}"#;
        assert!(serde_json::from_str::<Reading>(json).is_err());
    }
}
