//! Fiscal period arithmetic.
//!
//! EDGAR full indexes are published per calendar quarter, and raw reports are keyed
//! by the same `(year, quarter)` pair. [`Period`] validates the pair once so the rest
//! of the pipeline can rely on `quarter` being in `1..=4`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScreenerError};

/// A `(year, quarter)` reporting period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    year: i64,
    quarter: i64,
}

impl Period {
    /// Creates a validated period.
    ///
    /// # Errors
    /// Returns [`ScreenerError::InvalidParameter`] if `year` is not positive or
    /// `quarter` is outside `1..=4`.
    pub fn new(year: i64, quarter: i64) -> Result<Self> {
        if year <= 0 {
            return Err(ScreenerError::InvalidParameter(format!(
                "year must be positive, got {year}"
            )));
        }
        if !(1..=4).contains(&quarter) {
            return Err(ScreenerError::InvalidParameter(format!(
                "quarter must be between 1 and 4, got {quarter}"
            )));
        }
        Ok(Self { year, quarter })
    }

    /// Returns the calendar year.
    #[must_use]
    pub const fn year(&self) -> i64 {
        self.year
    }

    /// Returns the quarter (1-4).
    #[must_use]
    pub const fn quarter(&self) -> i64 {
        self.quarter
    }

    /// Returns true for the first quarter, where year-to-date figures are already
    /// quarterly figures.
    #[must_use]
    pub const fn is_first_quarter(&self) -> bool {
        self.quarter == 1
    }

    /// Returns the preceding quarter. Q1 wraps to Q4 of the previous year.
    #[must_use]
    pub const fn previous(&self) -> Self {
        if self.quarter == 1 {
            Self {
                year: self.year - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: self.year,
                quarter: self.quarter - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2020, 1, 2019, 4)]
    #[case(2020, 2, 2020, 1)]
    #[case(2020, 3, 2020, 2)]
    #[case(2020, 4, 2020, 3)]
    fn test_previous_quarter(
        #[case] year: i64,
        #[case] quarter: i64,
        #[case] prev_year: i64,
        #[case] prev_quarter: i64,
    ) {
        let prev = Period::new(year, quarter).unwrap().previous();
        assert_eq!(prev.year(), prev_year);
        assert_eq!(prev.quarter(), prev_quarter);
    }

    #[rstest]
    #[case(2020, 0)]
    #[case(2020, 5)]
    #[case(0, 1)]
    #[case(-1, 2)]
    fn test_invalid_period(#[case] year: i64, #[case] quarter: i64) {
        assert!(matches!(
            Period::new(year, quarter),
            Err(ScreenerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Period::new(2021, 3).unwrap().to_string(), "2021Q3");
        assert!(Period::new(2021, 1).unwrap().is_first_quarter());
    }
}
