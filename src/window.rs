use std::str::FromStr;

use chrono::{Duration, NaiveDate};

use crate::models::Window;

/// Fallback lookback when no usable start bound is given.
const DEFAULT_LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    LastMonth,
    Last3Months,
    Last6Months,
    LastYear,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::LastMonth,
        Preset::Last3Months,
        Preset::Last6Months,
        Preset::LastYear,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Preset::LastMonth => "1m",
            Preset::Last3Months => "3m",
            Preset::Last6Months => "6m",
            Preset::LastYear => "1y",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::LastMonth => "lastMonth",
            Preset::Last3Months => "last3Months",
            Preset::Last6Months => "last6Months",
            Preset::LastYear => "lastYear",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Preset::LastMonth => 30,
            Preset::Last3Months => 90,
            Preset::Last6Months => 180,
            Preset::LastYear => 365,
        }
    }
}

impl FromStr for Preset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.token() == s.trim())
            .ok_or(())
    }
}

fn parse_bound(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
}

/// Resolve a query window against `anchor`, the newest date in the data.
///
/// A known preset wins over explicit bounds. Missing or unparseable bounds
/// fall back to `anchor - 90 days` and `anchor`; inverted bounds are
/// swapped; the end never runs past the anchor unless the start does.
pub fn resolve(
    preset: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    anchor: NaiveDate,
) -> Window {
    if let Some(preset) = preset.and_then(|p| p.parse::<Preset>().ok()) {
        return Window {
            start: anchor - Duration::days(preset.days()),
            end: anchor,
        };
    }

    let start = parse_bound(start).unwrap_or(anchor - Duration::days(DEFAULT_LOOKBACK_DAYS));
    let end = parse_bound(end).unwrap_or(anchor);
    let (start, end) = if end < start { (end, start) } else { (start, end) };
    Window {
        start,
        end: end.min(anchor).max(start),
    }
}
