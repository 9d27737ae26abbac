use chrono::{Days, NaiveDate};

use crate::{EngineError, ResultEngine};

/// Days before the end date covered by the default window.
pub const DEFAULT_WINDOW_DAYS: u32 = 89;

/// Earliest date the sync ever considers.
pub fn default_floor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 1).unwrap_or(NaiveDate::MIN)
}

/// Inclusive date range requested from the bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Resolve the window for a run ending on `end`.
    ///
    /// Without an explicit start the window spans `span_days` back from
    /// `end`. The start never precedes `floor`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: NaiveDate,
        floor: NaiveDate,
        span_days: u32,
    ) -> ResultEngine<Self> {
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(u64::from(span_days)))
                .unwrap_or(floor),
        }
        .max(floor);

        if start > end {
            return Err(EngineError::Config(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }
}
