use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::KwError;

/// Broadcast season. Variant order is calendar order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Jan-Mar winter, Apr-Jun spring, Jul-Sep summer, Oct-Dec fall.
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=3 => Some(Season::Winter),
            4..=6 => Some(Season::Spring),
            7..=9 => Some(Season::Summer),
            10..=12 => Some(Season::Fall),
            _ => None,
        }
    }

    /// Case-insensitive; `autumn` is accepted for fall.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "winter" => Some(Season::Winter),
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "fall" | "autumn" => Some(Season::Fall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = KwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Season::parse(s).ok_or_else(|| KwError::InvalidParameter(format!("unknown season '{s}'")))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub year: i32,
    pub season: Season,
}

impl Period {
    pub fn current() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            season: Season::from_month(ts.month()).unwrap_or(Season::Winter),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}
