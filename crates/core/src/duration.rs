use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Contest running time, parsed strictly from strings like `"24h"` or `"30m"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestDuration {
    Hours(u32),
    Minutes(u32),
}

impl ContestDuration {
    pub fn as_secs(&self) -> u64 {
        match self {
            Self::Hours(h) => *h as u64 * 3600,
            Self::Minutes(m) => *m as u64 * 60,
        }
    }
}

impl fmt::Display for ContestDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hours(h) => write!(f, "{}h", h),
            Self::Minutes(m) => write!(f, "{}m", m),
        }
    }
}

impl FromStr for ContestDuration {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidDuration(s.to_string());

        let s_trim = s.trim();
        let split = s_trim.len().checked_sub(1).ok_or_else(invalid)?;
        if !s_trim.is_char_boundary(split) {
            return Err(invalid());
        }
        let (digits, unit) = s_trim.split_at(split);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }

        match unit {
            "h" | "H" => Ok(Self::Hours(value)),
            "m" | "M" => Ok(Self::Minutes(value)),
            _ => Err(invalid()),
        }
    }
}
