use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// History window requested from a data source, counted back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "count", rename_all = "snake_case")]
pub enum Lookback {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Months(2)
    }
}

impl Lookback {
    /// First instant covered by the window ending at `end`.
    pub fn start_from(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        let months = match *self {
            Lookback::Days(d) => return end - Duration::days(d as i64),
            Lookback::Weeks(w) => return end - Duration::weeks(w as i64),
            Lookback::Months(m) => m,
            Lookback::Years(y) => y.saturating_mul(12),
        };
        end.checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{}d", n),
            Lookback::Weeks(n) => write!(f, "{}w", n),
            Lookback::Months(n) => write!(f, "{}mo", n),
            Lookback::Years(n) => write!(f, "{}y", n),
        }
    }
}

impl FromStr for Lookback {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| AnalysisError::InvalidData(format!("lookback '{}' has no unit", s)))?;
        let (count, unit) = s.split_at(split);
        let count: u32 = count
            .parse()
            .map_err(|_| AnalysisError::InvalidData(format!("lookback '{}' has no count", s)))?;
        if count == 0 {
            return Err(AnalysisError::InvalidData("lookback must be positive".to_string()));
        }

        match unit {
            "d" | "day" | "days" => Ok(Lookback::Days(count)),
            "w" | "wk" | "week" | "weeks" => Ok(Lookback::Weeks(count)),
            "mo" | "month" | "months" => Ok(Lookback::Months(count)),
            "y" | "year" | "years" => Ok(Lookback::Years(count)),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown lookback unit '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_units() {
        assert_eq!("2mo".parse::<Lookback>().unwrap(), Lookback::Months(2));
        assert_eq!("60d".parse::<Lookback>().unwrap(), Lookback::Days(60));
        assert_eq!("3W".parse::<Lookback>().unwrap(), Lookback::Weeks(3));
        assert_eq!(" 1y ".parse::<Lookback>().unwrap(), Lookback::Years(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Lookback>().is_err());
        assert!("60".parse::<Lookback>().is_err());
        assert!("mo".parse::<Lookback>().is_err());
        assert!("0d".parse::<Lookback>().is_err());
        assert!("5q".parse::<Lookback>().is_err());
    }

    #[test]
    fn test_default_is_two_months() {
        assert_eq!(Lookback::default(), Lookback::Months(2));
        assert_eq!(Lookback::default().to_string(), "2mo");
    }

    #[test]
    fn test_start_from_calendar_months() {
        let end = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        let start = Lookback::Months(1).start_from(end);
        // Clamped to the last day of February
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());

        let start = Lookback::Days(10).start_from(end);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 21, 12, 0, 0).unwrap());
    }
}
