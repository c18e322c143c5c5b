//! The look-ahead guard shared by every signal generator.
//!
//! Membership and weights known at the start of period `t` are the values
//! observed at the end of period `t - 1`. Any panel used as a mask or as a
//! weight against period-`t` returns goes through `lag_one_period` first.

use crate::panel::Panel;

/// Shift every column down by one row. The first row becomes NaN.
pub fn lag_one_period(panel: &Panel) -> Panel {
    let mut lagged = panel.full_like(f64::NAN);
    for r in 1..panel.n_rows() {
        for c in 0..panel.n_cols() {
            lagged.set(r, c, panel.get(r - 1, c));
        }
    }
    lagged
}
