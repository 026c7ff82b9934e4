//! Trailing zero-production windows over one well's history.
//!
//! A window of `W` months ending at position `i` is all-zero exactly when the
//! zero-oil streak ending at `i` is at least `W` long. The streak can never
//! exceed the number of rows seen, so histories shorter than `W` report false.

use crate::models::{ZeroFlags, ZeroWindow};

// ---

/// Running length of the zero-oil streak ending at the latest month pushed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroRun {
    length: usize,
}

impl ZeroRun {
    /// Advance by one reporting month and return every window's result for it.
    ///
    /// Missing or NaN oil counts as neither zero nor positive and breaks the streak.
    pub fn push(&mut self, oil: Option<f64>) -> ZeroFlags {
        // ---
        self.length = match oil {
            Some(volume) if volume == 0.0 => self.length + 1,
            _ => 0,
        };
        self.flags()
    }

    pub fn covers(&self, window: ZeroWindow) -> bool {
        self.length >= window.months()
    }

    pub fn flags(&self) -> ZeroFlags {
        ZeroFlags {
            one_month: self.covers(ZeroWindow::OneMonth),
            two_months: self.covers(ZeroWindow::TwoMonths),
            three_months: self.covers(ZeroWindow::ThreeMonths),
            six_months: self.covers(ZeroWindow::SixMonths),
        }
    }
}

/// Zero flags for each month of one chronologically ordered history.
pub fn zero_flags<I>(oil_history: I) -> Vec<ZeroFlags>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut run = ZeroRun::default();
    oil_history.into_iter().map(|oil| run.push(oil)).collect()
}
