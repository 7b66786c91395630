use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A stored soil sensor reading. Rows are append-only; any measurement may be
/// `None` when the sensor did not report it.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub npk: Option<f64>,
}

/// Measurement fields of a reading before the store assigns id and timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingFields {
    pub moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub npk: Option<f64>,
}

impl From<&SensorReading> for ReadingFields {
    fn from(r: &SensorReading) -> Self {
        Self {
            moisture: r.moisture,
            temperature: r.temperature,
            ph: r.ph,
            npk: r.npk,
        }
    }
}

impl ReadingFields {
    /// Field-wise merge: values present in `self` win, gaps are filled from `other`.
    pub fn or(self, other: ReadingFields) -> ReadingFields {
        ReadingFields {
            moisture: self.moisture.or(other.moisture),
            temperature: self.temperature.or(other.temperature),
            ph: self.ph.or(other.ph),
            npk: self.npk.or(other.npk),
        }
    }

    /// True when every measurement is present.
    pub fn is_complete(&self) -> bool {
        self.named().iter().all(|(_, v)| v.is_some())
    }

    /// Named view used for per-field validation messages.
    pub fn named(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("moisture", self.moisture),
            ("temperature", self.temperature),
            ("ph", self.ph),
            ("npk", self.npk),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_prefers_self_and_fills_gaps() {
        let body = ReadingFields {
            moisture: Some(30.0),
            ..Default::default()
        };
        let latest = ReadingFields {
            moisture: Some(55.0),
            temperature: Some(21.0),
            ph: None,
            npk: Some(80.0),
        };
        let merged = body.or(latest);
        assert_eq!(merged.moisture, Some(30.0));
        assert_eq!(merged.temperature, Some(21.0));
        assert_eq!(merged.ph, None);
        assert_eq!(merged.npk, Some(80.0));
    }

    #[test]
    fn test_is_complete() {
        assert!(!ReadingFields::default().is_complete());
        assert!(!ReadingFields {
            ph: Some(6.8),
            ..Default::default()
        }
        .is_complete());
        assert!(ReadingFields {
            moisture: Some(1.0),
            temperature: Some(2.0),
            ph: Some(6.8),
            npk: Some(90.0),
        }
        .is_complete());
    }
}
