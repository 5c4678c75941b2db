use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Candle resolution, expressed the way the Bybit v5 kline endpoint expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H12,
    D1,
}

impl Interval {
    pub fn minutes(&self) -> u32 {
        match self {
            Interval::M1 => 1,
            Interval::M3 => 3,
            Interval::M5 => 5,
            Interval::M15 => 15,
            Interval::M30 => 30,
            Interval::H1 => 60,
            Interval::H2 => 120,
            Interval::H4 => 240,
            Interval::H6 => 360,
            Interval::H12 => 720,
            Interval::D1 => 1440,
        }
    }

    /// Query value for the `interval` parameter of `/v5/market/kline`.
    pub fn as_bybit(&self) -> &'static str {
        match self {
            Interval::M1 => "1",
            Interval::M3 => "3",
            Interval::M5 => "5",
            Interval::M15 => "15",
            Interval::M30 => "30",
            Interval::H1 => "60",
            Interval::H2 => "120",
            Interval::H4 => "240",
            Interval::H6 => "360",
            Interval::H12 => "720",
            Interval::D1 => "D",
        }
    }

    fn from_minutes(minutes: u32) -> Option<Self> {
        let interval = match minutes {
            1 => Interval::M1,
            3 => Interval::M3,
            5 => Interval::M5,
            15 => Interval::M15,
            30 => Interval::M30,
            60 => Interval::H1,
            120 => Interval::H2,
            240 => Interval::H4,
            360 => Interval::H6,
            720 => Interval::H12,
            1440 => Interval::D1,
            _ => return None,
        };
        Some(interval)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.minutes();
        if minutes >= 1440 {
            write!(f, "{}d", minutes / 1440)
        } else if minutes >= 60 {
            write!(f, "{}h", minutes / 60)
        } else {
            write!(f, "{}m", minutes)
        }
    }
}

/// Accepts Bybit notation (`15`, `60`, `D`) as well as `15m`, `1h`, `4h`, `1d`.
impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let invalid = || ConfigError::Invalid {
            key: "interval".to_string(),
            value: s.to_string(),
        };

        let minutes = if raw == "d" {
            1440
        } else if let Some(n) = raw.strip_suffix('m') {
            n.parse::<u32>().map_err(|_| invalid())?
        } else if let Some(n) = raw.strip_suffix('h') {
            let hours = n.parse::<u32>().map_err(|_| invalid())?;
            hours.checked_mul(60).ok_or_else(invalid)?
        } else if let Some(n) = raw.strip_suffix('d') {
            let days = n.parse::<u32>().map_err(|_| invalid())?;
            days.checked_mul(1440).ok_or_else(invalid)?
        } else {
            raw.parse::<u32>().map_err(|_| invalid())?
        };

        Self::from_minutes(minutes).ok_or_else(invalid)
    }
}
