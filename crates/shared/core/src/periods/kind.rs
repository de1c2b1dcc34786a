use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

/// Logical aggregation periods tracked per instrument
///
/// Every kind keeps exactly one current and at most one previous
/// [`PeriodPoi`](crate::PeriodPoi) slot in the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    /// 4-hour block subdividing the live session
    #[serde(rename = "4h")]
    FourHour,
    /// One trading day, opened by each accepted session start
    #[serde(rename = "1d")]
    Daily,
    /// The Monday trading day, tracked as its own period
    #[serde(rename = "mon")]
    MondaySession,
    /// ISO week
    #[serde(rename = "1w")]
    Weekly,
    /// Calendar month
    #[serde(rename = "1mo")]
    Monthly,
    /// Calendar quarter
    #[serde(rename = "1q")]
    Quarterly,
    /// Calendar year
    #[serde(rename = "1y")]
    Yearly,
}

impl PeriodKind {
    pub const ALL: [Self; 7] = [
        Self::FourHour,
        Self::Daily,
        Self::MondaySession,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Yearly,
    ];

    /// Number of period kinds, sized for fixed per-kind tables
    pub const COUNT: usize = Self::ALL.len();

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FourHour => "4h",
            Self::Daily => "1d",
            Self::MondaySession => "mon",
            Self::Weekly => "1w",
            Self::Monthly => "1mo",
            Self::Quarterly => "1q",
            Self::Yearly => "1y",
        }
    }

    /// Stable index into per-kind tables
    pub const fn index(self) -> usize {
        match self {
            Self::FourHour => 0,
            Self::Daily => 1,
            Self::MondaySession => 2,
            Self::Weekly => 3,
            Self::Monthly => 4,
            Self::Quarterly => 5,
            Self::Yearly => 6,
        }
    }

    /// Whether transitions for this kind are driven by session-start signals
    ///
    /// Four-hour blocks subdivide whatever the current session turns out to
    /// be, so they transition lazily during bar ingestion instead.
    pub const fn session_driven(self) -> bool {
        !matches!(self, Self::FourHour)
    }
}

impl Display for PeriodKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = AggregationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "4h" => Ok(Self::FourHour),
            "1d" => Ok(Self::Daily),
            "mon" => Ok(Self::MondaySession),
            "1w" => Ok(Self::Weekly),
            "1mo" => Ok(Self::Monthly),
            "1q" => Ok(Self::Quarterly),
            "1y" => Ok(Self::Yearly),
            other => Err(AggregationError::UnknownPeriodKind {
                value: other.to_owned(),
            }),
        }
    }
}
