//! Sampling interval of a price series.
//!
//! The sync logic treats [`Granularity`] as opaque; only providers interpret it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Frequency/granularity of time series data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Daily bars.
    Daily,
    /// Weekly bars.
    #[default]
    Weekly,
    /// Monthly bars.
    Monthly,
}

impl Granularity {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "day" | "daily" => Ok(Self::Daily),
            "1wk" | "1w" | "w" | "week" | "weekly" => Ok(Self::Weekly),
            "1mo" | "1m" | "m" | "month" | "monthly" => Ok(Self::Monthly),
            other => Err(DataError::InvalidParameter(format!(
                "Unknown granularity: {other}"
            ))),
        }
    }
}
